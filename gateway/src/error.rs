//! Gateway error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use soulfra_ledger::LedgerError;
use soulfra_router::RouterError;
use soulfra_store::StoreError;
use soulfra_trust::TrustError;
use soulfra_types::error::SoulfraError;

/// Startup and infrastructure failures, not tied to a single request.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("server error: {0}")]
    Server(String),
}

/// Wire shape of every error response. `code` is the stable machine
/// string from [`SoulfraError::code`]; `balance` and `tier` carry the
/// caller's current state when the handler knows which account failed.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<u8>,
}

/// A request-scoped error ready to be rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.into(),
                message: message.into(),
                balance: None,
                tier: None,
            },
        }
    }

    pub fn unauthorized() -> Self {
        let err = SoulfraError::Unauthorized;
        Self::new(StatusCode::UNAUTHORIZED, err.code(), err.to_string())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        let err = SoulfraError::InvalidRequest(message.into());
        Self::new(StatusCode::BAD_REQUEST, err.code(), err.to_string())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let err = SoulfraError::Internal(message.into());
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.code(), err.to_string())
    }

    /// Attach the caller's current balance and tier to the error body.
    pub fn with_account_state(mut self, balance: u128, tier: u8) -> Self {
        self.body.balance = Some(balance);
        self.body.tier = Some(tier);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<SoulfraError> for ApiError {
    fn from(err: SoulfraError) -> Self {
        let status = match &err {
            SoulfraError::InsufficientBalance { .. } | SoulfraError::TierInsufficient { .. } => {
                StatusCode::PAYMENT_REQUIRED
            }
            SoulfraError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            SoulfraError::ProviderUnavailable(_) | SoulfraError::AllProvidersFailed => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            SoulfraError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            SoulfraError::Unauthorized => StatusCode::UNAUTHORIZED,
            SoulfraError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SoulfraError::DuplicateCorrelation => StatusCode::CONFLICT,
            SoulfraError::LedgerWriteFailed(_) | SoulfraError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        let err = match err {
            RouterError::TierInsufficient { have, need } => {
                SoulfraError::TierInsufficient { have, need }
            }
            RouterError::QuotaExceeded => SoulfraError::QuotaExceeded,
            RouterError::NoProvider(capability) => SoulfraError::ProviderUnavailable(capability),
            RouterError::AllProvidersFailed => SoulfraError::AllProvidersFailed,
            RouterError::DeadlineExceeded => SoulfraError::DeadlineExceeded,
        };
        err.into()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance {
                kind,
                needed,
                available,
            } => SoulfraError::InsufficientBalance {
                kind,
                needed,
                available,
            }
            .into(),
            LedgerError::DuplicateCorrelation { .. } => SoulfraError::DuplicateCorrelation.into(),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<TrustError> for ApiError {
    fn from(err: TrustError) -> Self {
        ApiError::internal(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::internal(err.to_string())
    }
}

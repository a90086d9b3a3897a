//! HTTP request handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use soulfra_ledger::LedgerError;
use soulfra_registry::ProviderDescriptor;
use soulfra_router::ProviderRequest;
use soulfra_trust::TierAssessment;
use soulfra_types::error::SoulfraError;
use soulfra_types::id::{AccountId, CorrelationId, RequestId};
use soulfra_types::kind::{ReasonCode, TokenKind};
use soulfra_types::time::Timestamp;
use soulfra_types::LedgerEntry;

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::pagination::{next_cursor, HistoryQuery, PageMeta};
use crate::reconcile::ReconciliationRecord;
use crate::sanitize::sanitize;
use crate::server::AppState;

// ── Dispatch ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DispatchBody {
    pub capability_tag: String,
    pub payload: serde_json::Value,
    /// Caller deadline for the whole dispatch, fallbacks included. Clamped
    /// to the server's own budget; omitted means the full budget.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct DispatchReply {
    pub request_id: String,
    pub result: serde_json::Value,
    pub provider_used: String,
    pub cost_charged: u128,
    pub remaining_balance: u128,
}

/// `POST /v1/request` — authenticate, admit, dispatch, bill.
pub async fn dispatch_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<DispatchBody>,
) -> Result<Json<DispatchReply>, ApiError> {
    let now = Timestamp::now();
    let account = authenticate(&headers, &state.auth_secret)?;
    state.ledger.ensure_account(&account, now)?;

    if body.capability_tag.trim().is_empty() {
        return Err(ApiError::invalid("capability_tag must not be empty"));
    }

    let tier = state.trust.current_tier(&account)?;
    let balance = state.ledger.balance(&account, TokenKind::SpendableCoin)?;
    let with_state =
        |e: ApiError| -> ApiError { e.with_account_state(balance, tier.level()) };

    // Admission runs before any provider sees the request: a caller who
    // cannot possibly pay for the cheapest eligible provider is refused
    // here, so a zero-balance account never consumes a provider call.
    let chain = state
        .router
        .select_chain(tier, &body.capability_tag)
        .map_err(|e| with_state(e.into()))?;
    let min_cost = chain.iter().map(|d| d.cost_per_unit).min().unwrap_or(0);
    if balance < min_cost {
        return Err(with_state(
            SoulfraError::InsufficientBalance {
                kind: TokenKind::SpendableCoin,
                needed: min_cost,
                available: balance,
            }
            .into(),
        ));
    }

    let request = ProviderRequest {
        capability: body.capability_tag.clone(),
        payload: sanitize(&body.payload),
    };
    let request_id = RequestId::new(rand::random());

    // Server budget: enough time for the primary plus every allowed
    // fallback. The caller may shorten it, never extend it.
    let budget = Duration::from_secs(
        state.params.default_call_timeout_secs
            * u64::from(1 + state.params.max_fallback_attempts),
    );
    let timeout = match body.timeout_ms {
        Some(0) => return Err(ApiError::invalid("timeout_ms must be positive")),
        Some(ms) => budget.min(Duration::from_millis(ms)),
        None => budget,
    };
    let deadline = tokio::time::Instant::now() + timeout;

    let outcome = state
        .router
        .dispatch(&account, tier, &request, deadline)
        .await
        .map_err(|e| with_state(e.into()))?;

    let cost = outcome.cost();
    let correlation = CorrelationId::derive(&request_id, TokenKind::SpendableCoin);

    let remaining_balance = if cost == 0 {
        balance
    } else {
        match state.ledger.append(
            &account,
            TokenKind::SpendableCoin,
            -(cost as i128),
            ReasonCode::ProviderCharge,
            correlation,
            now,
        ) {
            Ok(entry) => entry.resulting_balance,
            Err(LedgerError::DuplicateCorrelation { .. }) => {
                state.ledger.balance(&account, TokenKind::SpendableCoin)?
            }
            // Provider already answered: return the result, queue the
            // charge for reconciliation instead of failing the caller.
            Err(e) => {
                error!(
                    account = %account,
                    correlation = %correlation,
                    provider = %outcome.provider.id,
                    cost,
                    error = %e,
                    "dispatch served but charge failed, queued for reconciliation"
                );
                state.reconcile.enqueue(ReconciliationRecord {
                    account_id: account,
                    correlation_id: correlation,
                    kind: TokenKind::SpendableCoin,
                    cost,
                    provider: outcome.provider.id.to_string(),
                    enqueued_at: now,
                });
                balance
            }
        }
    };

    Ok(Json(DispatchReply {
        request_id: request_id.to_string(),
        result: outcome.response.result,
        provider_used: outcome.provider.id.to_string(),
        cost_charged: cost,
        remaining_balance,
    }))
}

// ── Ledger history ───────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HistoryReply {
    pub account_id: String,
    pub kind: &'static str,
    pub entries: Vec<LedgerEntry>,
    pub page: PageMeta,
}

/// `GET /v1/ledger/{account_id}?kind=&since=&count=`
pub async fn ledger_history(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryReply>, ApiError> {
    let account = parse_account(&account_id)?;
    let kind = query
        .kind
        .as_deref()
        .and_then(TokenKind::parse)
        .ok_or_else(|| ApiError::invalid("kind must be one of earned_credit, spendable_coin, fragment"))?;

    let count = query.effective_count();
    let entries = state
        .ledger
        .history(&account, kind, query.since_seq(), count as usize)?;
    let next = next_cursor(entries.last().map(|e| e.seq), entries.len(), count);

    Ok(Json(HistoryReply {
        account_id,
        kind: kind.as_str(),
        entries,
        page: PageMeta { next },
    }))
}

// ── Trust ────────────────────────────────────────────────────────────────

/// `GET /v1/trust/{account_id}` — fresh tier assessment with breakdown.
pub async fn trust_assessment(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Json<TierAssessment>, ApiError> {
    let account = parse_account(&account_id)?;
    let assessment = state.trust.recompute(&account, Timestamp::now())?;
    Ok(Json(assessment))
}

// ── Providers ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CatalogQuery {
    pub tag: Option<String>,
}

#[derive(Serialize)]
pub struct CatalogReply {
    pub providers: Vec<ProviderDescriptor>,
}

/// `GET /v1/providers?tag=` — registry listing for operators.
pub async fn provider_catalog(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> Json<CatalogReply> {
    let providers = match query.tag.as_deref() {
        Some(tag) => state.registry.candidates(tag),
        None => state.registry.all(),
    };
    Json(CatalogReply { providers })
}

fn parse_account(s: &str) -> Result<AccountId, ApiError> {
    AccountId::from_hex(s).ok_or_else(|| ApiError::invalid("account_id must be 64 hex characters"))
}

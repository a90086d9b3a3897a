//! Bearer-token authentication.
//!
//! Tokens are opaque: the account id is a keyed digest of the token, so the
//! gateway never stores or logs the raw credential and needs no token table.
//! Any well-formed bearer token authenticates; the account it maps to is
//! created on first contact and starts at tier 0 with empty balances.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use soulfra_types::id::AccountId;

use crate::error::ApiError;

/// Resolve the caller's account from the `Authorization: Bearer` header.
pub fn authenticate(headers: &HeaderMap, secret: &[u8]) -> Result<AccountId, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(ApiError::unauthorized)?
        .to_str()
        .map_err(|_| ApiError::unauthorized())?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or_else(ApiError::unauthorized)?
        .trim();

    if token.is_empty() {
        return Err(ApiError::unauthorized());
    }

    Ok(AccountId::derive(token, secret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn same_token_same_account() {
        let a = authenticate(&headers_with("Bearer tok-1"), b"secret").unwrap();
        let b = authenticate(&headers_with("Bearer tok-1"), b"secret").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_tokens_different_accounts() {
        let a = authenticate(&headers_with("Bearer tok-1"), b"secret").unwrap();
        let b = authenticate(&headers_with("Bearer tok-2"), b"secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let err = authenticate(&HeaderMap::new(), b"secret").unwrap_err();
        assert_eq!(err.body.code, "unauthorized");
    }

    #[test]
    fn non_bearer_scheme_is_unauthorized() {
        assert!(authenticate(&headers_with("Basic dXNlcg=="), b"secret").is_err());
        assert!(authenticate(&headers_with("Bearer "), b"secret").is_err());
    }
}

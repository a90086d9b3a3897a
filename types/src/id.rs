//! Identifier types for accounts, requests, correlations, and providers.
//!
//! Account, request, and correlation ids are 32-byte values. Correlation ids
//! are derived deterministically from the request id plus the token kind they
//! charge, so a retried ledger write carries the same correlation id and the
//! ledger's idempotency check can absorb the retry.

use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::kind::TokenKind;

macro_rules! id32 {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            pub const ZERO: Self = Self([0u8; 32]);

            pub fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// Parse from a 64-character hex string.
            pub fn from_hex(s: &str) -> Option<Self> {
                if s.len() != 64 {
                    return None;
                }
                let mut bytes = [0u8; 32];
                for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
                    let hi = hex_val(chunk[0])?;
                    let lo = hex_val(chunk[1])?;
                    bytes[i] = (hi << 4) | lo;
                }
                Some(Self(bytes))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "({})"), hex_encode(&self.0[..4]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex_encode(&self.0))
            }
        }
    };
}

id32!(AccountId, "AccountId");
id32!(RequestId, "RequestId");
id32!(CorrelationId, "CorrelationId");

impl AccountId {
    /// Derive an account id from an opaque bearer token and a server secret.
    ///
    /// Keyed so that raw tokens never appear in the ledger or logs.
    pub fn derive(token: &str, secret: &[u8]) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(b"soulfra.account.v1");
        hasher.update(secret);
        hasher.update(token.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest[..32]);
        Self(bytes)
    }
}

impl CorrelationId {
    /// Derive the correlation id for a ledger write caused by `request_id`
    /// against a given token kind.
    pub fn derive(request_id: &RequestId, kind: TokenKind) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(b"soulfra.correlation.v1");
        hasher.update(request_id.as_bytes());
        hasher.update([kind.as_u8()]);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest[..32]);
        Self(bytes)
    }
}

/// A provider identifier — short human-assigned slug (e.g. "anthropic-large").
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderId({})", self.0)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

// Inline hex encoding to avoid adding the `hex` crate as a dependency of types.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_derivation_is_stable() {
        let a = AccountId::derive("token-1", b"secret");
        let b = AccountId::derive("token-1", b"secret");
        assert_eq!(a, b);
    }

    #[test]
    fn account_id_derivation_depends_on_secret() {
        let a = AccountId::derive("token-1", b"secret");
        let b = AccountId::derive("token-1", b"other");
        assert_ne!(a, b);
    }

    #[test]
    fn correlation_id_differs_per_kind() {
        let req = RequestId::new([7u8; 32]);
        let a = CorrelationId::derive(&req, TokenKind::SpendableCoin);
        let b = CorrelationId::derive(&req, TokenKind::EarnedCredit);
        assert_ne!(a, b);
    }

    #[test]
    fn hex_roundtrip() {
        let id = AccountId::new([0xAB; 32]);
        let parsed = AccountId::from_hex(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(AccountId::from_hex("zz").is_none());
        assert!(AccountId::from_hex(&"g".repeat(64)).is_none());
    }
}

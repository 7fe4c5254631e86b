//! Idempotency keys for invoice payment.
//!
//! A key is bound to the first invoice it successfully pays. Replaying it on
//! that invoice returns the stored receipt; using it on any other invoice is
//! a conflict. Declined attempts never bind a key.

use super::error::BillingError;
use super::invoice::PayReceipt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request header carrying the key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
/// Response header set when a stored receipt is replayed.
pub const IDEMPOTENT_REPLAYED_HEADER: &str = "Idempotent-Replayed";

const MAX_KEY_LEN: usize = 255;

/// A validated idempotency key: 1 to 255 printable ASCII characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn parse(raw: impl Into<String>) -> Result<Self, BillingError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(BillingError::InvalidIdempotencyKey {
                reason: "key must not be empty".to_string(),
            });
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(BillingError::InvalidIdempotencyKey {
                reason: format!("key must be at most {} characters", MAX_KEY_LEN),
            });
        }
        if !raw.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
            return Err(BillingError::InvalidIdempotencyKey {
                reason: "key must be printable ASCII".to_string(),
            });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = BillingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> Self {
        key.0
    }
}

/// What a consumed key is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayRecord {
    pub invoice_id: i64,
    pub receipt: PayReceipt,
}

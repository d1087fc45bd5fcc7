use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a completed payment buys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseTarget {
    Character(String),
    UnlimitedAccess,
}

impl PurchaseTarget {
    pub fn character_id(&self) -> Option<&str> {
        match self {
            PurchaseTarget::Character(id) => Some(id),
            PurchaseTarget::UnlimitedAccess => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid invoice payload: {0}")]
pub struct PayloadError(String);

/// Purchase intent carried through Telegram's native checkout. Encoded as
/// JSON in the invoice payload and parsed back on successful payment;
/// decoding rejects unknown `type` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvoicePayload {
    CharacterUnlock {
        #[serde(rename = "userId")]
        user_id: i64,
        #[serde(rename = "characterId")]
        character_id: String,
    },
    UnlimitedAccess {
        #[serde(rename = "userId")]
        user_id: i64,
    },
}

impl InvoicePayload {
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap()
    }

    pub fn decode(raw: &str) -> Result<Self, PayloadError> {
        serde_json::from_str(raw).map_err(|e| PayloadError(e.to_string()))
    }

    pub fn user_id(&self) -> i64 {
        match self {
            InvoicePayload::CharacterUnlock { user_id, .. } => *user_id,
            InvoicePayload::UnlimitedAccess { user_id } => *user_id,
        }
    }
}

/// Outcome of a settlement. `already_settled` marks an idempotent replay
/// (retried webhook, re-sent screenshot): the entitlement was applied by an
/// earlier settlement and nothing was mutated this time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub user_id: i64,
    pub target: PurchaseTarget,
    pub external_ref: String,
    pub already_settled: bool,
}

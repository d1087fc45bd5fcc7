use amora_core::helpers::dto::PurchaseTarget;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    FromUser,
    FromBot,
}

/// One chat_history row. Append-only.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoredMessage {
    pub text: String,
    pub direction: Direction,
    pub timestamp: i64,
}

/// One users row. `record_user` upserts name/persona and never touches
/// `unlimited_access`; only a settled payment flips that flag.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UserRecord {
    pub username: String,
    pub persona: Option<String>,
    pub unlimited_access: bool,
    pub created_at: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Completed,
}

/// One stars_transactions row, keyed by the external payment reference.
/// Never mutated after completion; pending rows may only move to completed.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TransactionRecord {
    pub user_id: i64,
    pub target: PurchaseTarget,
    pub amount: u32,
    pub status: TransactionStatus,
    pub created_at: i64,
}

//! Flat-file {paid, pending} user-id lists kept by the manual-proof path.
//! The pending list decides which incoming photos are treated as payment
//! proof; the entitlement store stays the source of truth for grants.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to access UPI ledger: {0}")]
    Io(#[from] std::io::Error),
    #[error("UPI ledger is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct LedgerLists {
    paid: Vec<String>,
    pending: Vec<String>,
}

#[derive(Clone)]
pub struct ManualLedger {
    path: PathBuf,
}

impl ManualLedger {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn load(&self) -> Result<LedgerLists, LedgerError> {
        if !self.path.exists() {
            return Ok(LedgerLists::default());
        }
        let raw = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    fn save(&self, lists: &LedgerLists) -> Result<(), LedgerError> {
        std::fs::write(&self.path, serde_json::to_vec_pretty(lists)?)?;
        Ok(())
    }

    pub fn mark_pending(&self, user_id: i64) -> Result<(), LedgerError> {
        let mut lists = self.load()?;
        let id = user_id.to_string();
        if !lists.pending.contains(&id) && !lists.paid.contains(&id) {
            lists.pending.push(id);
            self.save(&lists)?;
        }
        Ok(())
    }

    /// Moves the user from pending to paid. Idempotent.
    pub fn mark_paid(&self, user_id: i64) -> Result<(), LedgerError> {
        let mut lists = self.load()?;
        let id = user_id.to_string();
        lists.pending.retain(|p| p != &id);
        if !lists.paid.contains(&id) {
            lists.paid.push(id);
        }
        self.save(&lists)
    }

    pub fn is_paid(&self, user_id: i64) -> Result<bool, LedgerError> {
        Ok(self.load()?.paid.contains(&user_id.to_string()))
    }

    pub fn is_pending(&self, user_id: i64) -> Result<bool, LedgerError> {
        Ok(self.load()?.pending.contains(&user_id.to_string()))
    }
}

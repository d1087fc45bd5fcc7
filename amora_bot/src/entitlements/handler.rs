//! Sled-backed entitlement store: the single source of truth for who may
//! chat, which characters they own and which payments already settled.

use amora_core::helpers::dto::PurchaseTarget;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::{Db, IVec, Tree};
use thiserror::Error;

use super::dto::{Direction, StoredMessage, TransactionRecord, TransactionStatus, UserRecord};

const USERS_TREE: &str = "users";
const CHAT_HISTORY_TREE: &str = "chat_history";
const CHARACTER_UNLOCKS_TREE: &str = "character_unlocks";
const ACTIVE_CHARACTER_TREE: &str = "user_active_character";
const TRANSACTIONS_TREE: &str = "stars_transactions";

/// Retryable storage failure. The gate fails closed on this: deny serving,
/// charge nothing.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] sled::Error),
    #[error("stored record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ActiveCharacterRecord {
    character_id: String,
    set_at: i64,
}

#[derive(Clone)]
pub struct EntitlementStore {
    db: Db,
    users: Tree,
    history: Tree,
    unlocks: Tree,
    active: Tree,
    transactions: Tree,
}

fn user_key(user_id: i64) -> [u8; 8] {
    user_id.to_be_bytes()
}

fn history_key(user_id: i64, seq: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&user_id.to_be_bytes());
    key[8..].copy_from_slice(&seq.to_be_bytes());
    key
}

fn unlock_key(user_id: i64, character_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + character_id.len());
    key.extend_from_slice(&user_id.to_be_bytes());
    key.extend_from_slice(character_id.as_bytes());
    key
}

fn decode<T: for<'de> Deserialize<'de>>(ivec: IVec) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(&ivec)?)
}

impl EntitlementStore {
    pub fn new(db: &Db) -> sled::Result<Self> {
        Ok(Self {
            db: db.clone(),
            users: db.open_tree(USERS_TREE)?,
            history: db.open_tree(CHAT_HISTORY_TREE)?,
            unlocks: db.open_tree(CHARACTER_UNLOCKS_TREE)?,
            active: db.open_tree(ACTIVE_CHARACTER_TREE)?,
            transactions: db.open_tree(TRANSACTIONS_TREE)?,
        })
    }

    fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>, StoreError> {
        match self.users.get(user_key(user_id))? {
            Some(ivec) => Ok(Some(decode(ivec)?)),
            None => Ok(None),
        }
    }

    fn put_user(&self, user_id: i64, record: &UserRecord) -> Result<(), StoreError> {
        self.users
            .insert(user_key(user_id), serde_json::to_vec(record)?)?;
        Ok(())
    }

    /// Upsert identity fields. Existing unlock/payment state is kept; a
    /// `None` persona leaves any previously chosen persona in place.
    pub fn record_user(
        &self,
        user_id: i64,
        username: &str,
        persona: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut record = self.get_user(user_id)?.unwrap_or_else(|| UserRecord {
            created_at: Utc::now().timestamp(),
            ..UserRecord::default()
        });
        record.username = username.to_string();
        if let Some(persona) = persona {
            record.persona = Some(persona.to_string());
        }
        self.put_user(user_id, &record)
    }

    pub fn persona(&self, user_id: i64) -> Result<Option<String>, StoreError> {
        Ok(self.get_user(user_id)?.and_then(|u| u.persona))
    }

    pub fn append_message(
        &self,
        user_id: i64,
        text: &str,
        direction: Direction,
    ) -> Result<(), StoreError> {
        let seq = self.db.generate_id()?;
        let message = StoredMessage {
            text: text.to_string(),
            direction,
            timestamp: Utc::now().timestamp(),
        };
        self.history
            .insert(history_key(user_id, seq), serde_json::to_vec(&message)?)?;
        Ok(())
    }

    /// Count of from-user rows. Monotonic: history is append-only.
    pub fn count_user_messages(&self, user_id: i64) -> Result<u32, StoreError> {
        let mut count = 0u32;
        for entry in self.history.scan_prefix(user_key(user_id)) {
            let (_, ivec) = entry?;
            let message: StoredMessage = decode(ivec)?;
            if message.direction == Direction::FromUser {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Last `limit` history rows, oldest first. Sequence numbers are
    /// monotonic, so the prefix scan is already chronological.
    pub fn recent_messages(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let mut messages = Vec::new();
        for entry in self.history.scan_prefix(user_key(user_id)) {
            let (_, ivec) = entry?;
            messages.push(decode(ivec)?);
        }
        if messages.len() > limit {
            messages.drain(..messages.len() - limit);
        }
        Ok(messages)
    }

    pub fn has_unlimited_access(&self, user_id: i64) -> Result<bool, StoreError> {
        Ok(self
            .get_user(user_id)?
            .map(|u| u.unlimited_access)
            .unwrap_or(false))
    }

    /// Idempotent; the flag has no expiry.
    pub fn grant_unlimited_access(&self, user_id: i64) -> Result<(), StoreError> {
        let mut record = self.get_user(user_id)?.unwrap_or_else(|| UserRecord {
            created_at: Utc::now().timestamp(),
            ..UserRecord::default()
        });
        record.unlimited_access = true;
        self.put_user(user_id, &record)
    }

    /// `locked` is the catalog flag for the character: free characters are
    /// unlocked for everyone, locked ones need an unlock row.
    pub fn is_character_unlocked(
        &self,
        user_id: i64,
        character_id: &str,
        locked: bool,
    ) -> Result<bool, StoreError> {
        if !locked {
            return Ok(true);
        }
        Ok(self.unlocks.contains_key(unlock_key(user_id, character_id))?)
    }

    /// Idempotent insert. Returns whether a new unlock row was created;
    /// `false` flags a duplicate-payment replay to the caller.
    pub fn unlock_character(&self, user_id: i64, character_id: &str) -> Result<bool, StoreError> {
        let key = unlock_key(user_id, character_id);
        if self.unlocks.contains_key(&key)? {
            return Ok(false);
        }
        self.unlocks
            .insert(key, serde_json::to_vec(&Utc::now().timestamp())?)?;
        Ok(true)
    }

    /// Refuses (returns false) when the character is locked and has no
    /// unlock row; otherwise overwrites the single active-selection row.
    pub fn set_active_character(
        &self,
        user_id: i64,
        character_id: &str,
        locked: bool,
    ) -> Result<bool, StoreError> {
        if !self.is_character_unlocked(user_id, character_id, locked)? {
            return Ok(false);
        }
        let record = ActiveCharacterRecord {
            character_id: character_id.to_string(),
            set_at: Utc::now().timestamp(),
        };
        self.active
            .insert(user_key(user_id), serde_json::to_vec(&record)?)?;
        Ok(true)
    }

    pub fn get_active_character(&self, user_id: i64) -> Result<Option<String>, StoreError> {
        match self.active.get(user_key(user_id))? {
            Some(ivec) => {
                let record: ActiveCharacterRecord = decode(ivec)?;
                Ok(Some(record.character_id))
            }
            None => Ok(None),
        }
    }

    pub fn unlocked_characters(&self, user_id: i64) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in self.unlocks.scan_prefix(user_key(user_id)) {
            let (key, _) = entry?;
            ids.push(String::from_utf8_lossy(&key[8..]).into_owned());
        }
        Ok(ids)
    }

    /// Insert keyed by the external payment reference. Returns false without
    /// touching anything when the reference was seen before; this is what
    /// guarantees at-most-once unlock per payment under webhook retries.
    pub fn record_transaction(
        &self,
        external_ref: &str,
        user_id: i64,
        target: PurchaseTarget,
        amount: u32,
        status: TransactionStatus,
    ) -> Result<bool, StoreError> {
        if self.transactions.contains_key(external_ref.as_bytes())? {
            return Ok(false);
        }
        let record = TransactionRecord {
            user_id,
            target,
            amount,
            status,
            created_at: Utc::now().timestamp(),
        };
        self.transactions
            .insert(external_ref.as_bytes(), serde_json::to_vec(&record)?)?;
        Ok(true)
    }

    pub fn transaction(&self, external_ref: &str) -> Result<Option<TransactionRecord>, StoreError> {
        match self.transactions.get(external_ref.as_bytes())? {
            Some(ivec) => Ok(Some(decode(ivec)?)),
            None => Ok(None),
        }
    }

    /// pending -> completed; the only permitted transaction mutation.
    pub fn complete_transaction(&self, external_ref: &str) -> Result<(), StoreError> {
        if let Some(mut record) = self.transaction(external_ref)? {
            record.status = TransactionStatus::Completed;
            self.transactions
                .insert(external_ref.as_bytes(), serde_json::to_vec(&record)?)?;
        }
        Ok(())
    }
}

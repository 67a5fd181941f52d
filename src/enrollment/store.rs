//! The single pending-enrollment slot.
//!
//! Holds the record that bridges the redirect out to the payment enabler and
//! the redirect back. Writing a new record replaces any existing one; a
//! successful callback removes it with [`PendingStore::clear_if`] so a stale
//! callback cannot delete a newer enrollment's record.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::site::db::DbHandle;

/// Storage key of the slot, shared by every backend.
pub const PENDING_KEY: &str = "patpass_data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEnrollment {
    pub plan: String,
    pub amount: i64,
    pub buy_order: String,
    pub session_id: String,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
}

#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Store `pending`, returning the record it replaced, if any.
    async fn set(&self, pending: PendingEnrollment) -> Result<Option<PendingEnrollment>>;

    async fn get(&self) -> Result<Option<PendingEnrollment>>;

    /// Remove whatever is stored. Returns whether a record was removed.
    async fn clear(&self) -> Result<bool>;

    /// Remove the record only if it still belongs to `buy_order`.
    async fn clear_if(&self, buy_order: &str) -> Result<bool>;
}

#[derive(Debug, Default)]
pub struct MemoryPendingStore {
    slot: Mutex<Option<PendingEnrollment>>,
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<PendingEnrollment>>> {
        self.slot
            .lock()
            .map_err(|e| anyhow::anyhow!("Pending slot lock poisoned: {}", e))
    }
}

#[async_trait]
impl PendingStore for MemoryPendingStore {
    async fn set(&self, pending: PendingEnrollment) -> Result<Option<PendingEnrollment>> {
        Ok(self.lock()?.replace(pending))
    }

    async fn get(&self) -> Result<Option<PendingEnrollment>> {
        Ok(self.lock()?.clone())
    }

    async fn clear(&self) -> Result<bool> {
        Ok(self.lock()?.take().is_some())
    }

    async fn clear_if(&self, buy_order: &str) -> Result<bool> {
        let mut slot = self.lock()?;
        match slot.as_ref() {
            Some(p) if p.buy_order == buy_order => {
                *slot = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Slot persisted as a JSON value in the site database's `settings` table.
#[derive(Clone)]
pub struct SqlitePendingStore {
    db: DbHandle,
}

impl SqlitePendingStore {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PendingStore for SqlitePendingStore {
    async fn set(&self, pending: PendingEnrollment) -> Result<Option<PendingEnrollment>> {
        let value = serde_json::to_string(&pending)?;
        let previous = self
            .db
            .call(move |db| {
                let previous = db.get_setting(PENDING_KEY)?;
                db.put_setting(PENDING_KEY, &value)?;
                Ok(previous)
            })
            .await?;

        // An unreadable previous value is simply replaced.
        Ok(previous.and_then(|json| match serde_json::from_str(&json) {
            Ok(previous) => Some(previous),
            Err(e) => {
                warn!(error = %e, "discarding unreadable pending enrollment");
                None
            }
        }))
    }

    async fn get(&self) -> Result<Option<PendingEnrollment>> {
        self.db
            .call(|db| db.get_setting(PENDING_KEY))
            .await?
            .map(|json| serde_json::from_str(&json).map_err(anyhow::Error::from))
            .transpose()
    }

    async fn clear(&self) -> Result<bool> {
        self.db.call(|db| db.delete_setting(PENDING_KEY)).await
    }

    async fn clear_if(&self, buy_order: &str) -> Result<bool> {
        let buy_order = buy_order.to_string();
        self.db
            .call(move |db| db.delete_setting_if_field(PENDING_KEY, "$.buyOrder", &buy_order))
            .await
    }
}

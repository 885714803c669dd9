// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read/merge-write access to the settings record plus its change feed.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use crate::clock::Clock;
use crate::persist::StorageUnavailable;
use crate::settings::view::{derive_view, SettingsView};
use crate::settings::{SettingsPatch, SettingsPersistence, SettingsRecord};

/// Capacity of the change feed. Lagging receivers re-read the store.
pub(crate) const CHANGE_FEED_CAPACITY: usize = 64;

/// Failure of [`SettingsStore::write`]. The stored record is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("malformed settings: {0}")]
    Malformed(String),
    #[error(transparent)]
    Storage(#[from] StorageUnavailable),
}

pub struct SettingsStore {
    persistence: Arc<dyn SettingsPersistence>,
    clock: Arc<dyn Clock>,
    /// Serializes read-merge-upsert within this process.
    write_lock: Mutex<()>,
    changes: broadcast::Sender<SettingsRecord>,
}

impl SettingsStore {
    pub fn new(persistence: Arc<dyn SettingsPersistence>, clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { persistence, clock, write_lock: Mutex::new(()), changes }
    }

    /// Return the current record, creating it with defaults on first access.
    pub async fn read(&self) -> Result<SettingsRecord, StorageUnavailable> {
        if let Some(record) = self.persistence.get().await? {
            return Ok(record);
        }

        let _guard = self.write_lock.lock().await;
        // Another writer may have created it while we waited.
        if let Some(record) = self.persistence.get().await? {
            return Ok(record);
        }
        let record = self.persistence.upsert(SettingsPatch::default(), self.clock.now_ms()).await?;
        tracing::info!(updated_at = record.updated_at, "created default settings record");
        Ok(record)
    }

    /// Return the current view, or the unavailable sentinel when storage fails.
    pub async fn read_view(&self) -> SettingsView {
        match self.read().await {
            Ok(record) => derive_view(&record),
            Err(e) => {
                tracing::warn!(err = %e, "settings storage unavailable, serving default view");
                SettingsView::unavailable()
            }
        }
    }

    /// Validate and merge `patch`, persist it and announce the new record.
    pub async fn write(&self, patch: SettingsPatch) -> Result<SettingsRecord, WriteError> {
        patch.validate().map_err(WriteError::Malformed)?;

        let guard = self.write_lock.lock().await;
        let record = self.persistence.upsert(patch, self.clock.now_ms()).await?;
        // Announced under the lock so the feed follows `updated_at` order.
        // No receivers simply means nobody is relaying yet.
        let _ = self.changes.send(record.clone());
        drop(guard);

        tracing::info!(
            selection_type = record.selection_type.as_str(),
            updated_at = record.updated_at,
            "settings updated"
        );
        Ok(record)
    }

    /// Subscribe to successful writes.
    pub fn changes(&self) -> broadcast::Receiver<SettingsRecord> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Forwards settings changes to the broadcast hub.
//!
//! This is the only caller of [`BroadcastHub::publish`]: transports deliver
//! frames, they never originate settings pushes.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::BroadcastHub;
use crate::settings::store::SettingsStore;
use crate::settings::view::derive_view;

/// Spawn the relay task. It runs until `shutdown` is cancelled.
pub fn spawn_settings_relay(
    store: Arc<SettingsStore>,
    hub: Arc<BroadcastHub>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let mut changes = store.changes();
    tokio::spawn(async move {
        // Records still queued behind a lag re-read are older than what was sent.
        let mut published = 0;
        loop {
            let record = tokio::select! {
                _ = shutdown.cancelled() => break,
                change = changes.recv() => match change {
                    Ok(record) => record,
                    Err(RecvError::Lagged(skipped)) => {
                        // Intermediate states are superseded; only the latest matters.
                        tracing::warn!(skipped, "settings relay lagged, re-reading store");
                        match store.read().await {
                            Ok(record) => record,
                            Err(e) => {
                                tracing::warn!(err = %e, "settings relay could not re-read store");
                                continue;
                            }
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            if record.updated_at <= published {
                continue;
            }
            published = record.updated_at;
            hub.publish(&derive_view(&record));
        }
        tracing::debug!("settings relay stopped");
    })
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;

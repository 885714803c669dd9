// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side synchronization of the displayed settings view.
//!
//! [`SyncMachine`] holds the pure state transitions and the latest-wins rule.
//! [`SyncAgent`] drives it over a [`Connector`]: it opens the push channel,
//! pulls a snapshot alongside it, and reconnects with bounded backoff.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use encore::settings::view::SettingsView;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Initial delay before the first reconnection attempt.
pub const RECONNECT_INITIAL: Duration = Duration::from_millis(500);
/// Upper bound on the reconnection delay.
pub const RECONNECT_MAX: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Disconnected,
    Connecting,
    AwaitingSnapshot,
    Synced,
    Reconnecting { attempt: u32 },
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::AwaitingSnapshot => f.write_str("awaiting_snapshot"),
            Self::Synced => f.write_str("synced"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting({attempt})"),
        }
    }
}

/// Delay before reconnection attempt `attempt` (zero-based).
pub fn backoff(attempt: u32, initial: Duration, max: Duration) -> Duration {
    initial.checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX)).unwrap_or(max).min(max)
}

/// Pure sync state plus the displayed view.
#[derive(Debug, Clone)]
pub struct SyncMachine {
    state: SyncState,
    view: Option<SettingsView>,
    /// Consecutive failed attempts since the last sync.
    failures: u32,
    torn_down: bool,
}

impl Default for SyncMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMachine {
    pub fn new() -> Self {
        Self { state: SyncState::Disconnected, view: None, failures: 0, torn_down: false }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// The view currently displayed. Survives disconnects.
    pub fn view(&self) -> Option<&SettingsView> {
        self.view.as_ref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn start(&mut self) {
        if !self.torn_down && self.state == SyncState::Disconnected {
            self.state = SyncState::Connecting;
        }
    }

    /// The push channel is open; wait for the first view.
    pub fn connected(&mut self) {
        if self.torn_down {
            return;
        }
        if matches!(self.state, SyncState::Connecting | SyncState::Reconnecting { .. }) {
            self.state = SyncState::AwaitingSnapshot;
        }
    }

    /// Offer a view from either the snapshot pull or the push stream.
    ///
    /// Returns `true` when it replaced the displayed view. A view that is not
    /// strictly newer than the displayed one is discarded, but the first view
    /// to arrive after connecting still completes the sync.
    pub fn apply(&mut self, view: SettingsView) -> bool {
        if self.torn_down || self.state == SyncState::Disconnected {
            return false;
        }
        if self.state == SyncState::AwaitingSnapshot {
            self.state = SyncState::Synced;
            self.failures = 0;
        }
        let newer = self.view.as_ref().is_none_or(|shown| view.updated_at > shown.updated_at);
        if newer {
            self.view = Some(view);
        }
        newer
    }

    /// Record a transport failure.
    ///
    /// Returns the delay before the next attempt, or `None` once
    /// `max_retries` consecutive attempts failed and the machine gave up.
    pub fn transport_error(
        &mut self,
        max_retries: u32,
        initial: Duration,
        max: Duration,
    ) -> Option<Duration> {
        if self.torn_down {
            return None;
        }
        if self.failures >= max_retries {
            self.state = SyncState::Disconnected;
            return None;
        }
        let attempt = self.failures;
        self.failures += 1;
        self.state = SyncState::Reconnecting { attempt };
        Some(backoff(attempt, initial, max))
    }

    /// Stop for good. Nothing is applied afterwards.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.state = SyncState::Disconnected;
    }
}

/// Transport failure reported by a [`Connector`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Views pushed by the server, in publish order.
pub type PushStream = BoxStream<'static, Result<SettingsView, TransportError>>;

/// Transport used by the agent. Object-safe.
pub trait Connector: Send + Sync {
    /// Open the push channel.
    fn connect(&self) -> BoxFuture<'_, Result<PushStream, TransportError>>;

    /// Pull the current view.
    fn pull_snapshot(&self) -> BoxFuture<'_, Result<SettingsView, TransportError>>;
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_retries: u32,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_initial: RECONNECT_INITIAL,
            backoff_max: RECONNECT_MAX,
        }
    }
}

/// What observers see: the state and the displayed view.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSnapshot {
    pub state: SyncState,
    pub view: Option<SettingsView>,
}

enum SessionEnd {
    Cancelled,
    Failed(TransportError),
}

/// Drives a [`SyncMachine`] over a [`Connector`] until cancelled or out of
/// retries.
pub struct SyncAgent {
    connector: Arc<dyn Connector>,
    config: AgentConfig,
    machine: SyncMachine,
    tx: watch::Sender<AgentSnapshot>,
}

impl SyncAgent {
    pub fn new(
        connector: Arc<dyn Connector>,
        config: AgentConfig,
    ) -> (Self, watch::Receiver<AgentSnapshot>) {
        let machine = SyncMachine::new();
        let (tx, rx) = watch::channel(AgentSnapshot { state: machine.state(), view: None });
        (Self { connector, config, machine, tx }, rx)
    }

    /// Run until `cancel` fires or retries are exhausted. Returns the final
    /// state and view.
    pub async fn run(mut self, cancel: CancellationToken) -> AgentSnapshot {
        self.machine.start();
        self.publish();

        loop {
            let connector = Arc::clone(&self.connector);
            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                r = connector.connect() => r,
            };

            let err = match connected {
                Ok(stream) => {
                    self.machine.connected();
                    self.publish();
                    tracing::info!("push channel open, pulling snapshot");
                    match self.session(&connector, stream, &cancel).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Failed(e) => e,
                    }
                }
                Err(e) => e,
            };

            let delay = self.machine.transport_error(
                self.config.max_retries,
                self.config.backoff_initial,
                self.config.backoff_max,
            );
            self.publish();
            let Some(delay) = delay else {
                tracing::warn!(err = %err, "giving up after {} attempts", self.config.max_retries);
                return self.snapshot();
            };
            tracing::warn!(err = %err, delay_ms = delay.as_millis() as u64, "transport error, reconnecting");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => break,
            }
        }

        self.machine.teardown();
        self.publish();
        tracing::debug!("sync agent stopped");
        self.snapshot()
    }

    /// One connection: race the snapshot pull against the push stream.
    async fn session(
        &mut self,
        connector: &Arc<dyn Connector>,
        mut stream: PushStream,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let mut pull = connector.pull_snapshot();
        let mut pulled = false;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return SessionEnd::Cancelled,
                res = &mut pull, if !pulled => {
                    pulled = true;
                    match res {
                        Ok(view) => self.offer(view, "snapshot"),
                        Err(e) => return SessionEnd::Failed(e),
                    }
                }
                item = stream.next() => match item {
                    Some(Ok(view)) => self.offer(view, "push"),
                    Some(Err(e)) => return SessionEnd::Failed(e),
                    None => return SessionEnd::Failed(TransportError("push channel closed".to_owned())),
                },
            }
        }
    }

    fn offer(&mut self, view: SettingsView, source: &str) {
        let updated_at = view.updated_at;
        if self.machine.apply(view) {
            tracing::debug!(source, updated_at, "view applied");
        } else {
            tracing::debug!(source, updated_at, "stale view discarded");
        }
        self.publish();
    }

    fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot { state: self.machine.state(), view: self.machine.view().cloned() }
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;

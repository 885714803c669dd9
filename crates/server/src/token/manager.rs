// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token lifecycle manager: validity checks, single-flight refresh, code exchange.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::token::provider::{OAuthProvider, ProviderError};
use crate::token::{TokenError, TokenRecord, TokenStore, TokenUpdate};

/// Outcome of one refresh, shared by every caller attached to it.
type SharedRefresh = Shared<BoxFuture<'static, Result<String, TokenError>>>;

/// The refresh currently talking to the provider, if any.
struct InFlight {
    id: u64,
    outcome: SharedRefresh,
}

/// In-memory view of the credential, kept consistent under one lock.
#[derive(Default)]
struct Local {
    /// Last record read from or written to the store.
    cached: Option<TokenRecord>,
    /// Bumped whenever a write replaces `cached`.
    revision: u64,
    /// Update the store refused, with its write sequence. While set, `cached`
    /// is newer than the store and reads never replace it.
    unsaved: Option<(u64, TokenUpdate)>,
    /// Set when the provider refused the grant `cached` still holds.
    rejection: Option<String>,
}

impl Local {
    fn rejected(&self) -> Option<TokenError> {
        self.rejection.clone().map(TokenError::ProviderRejected)
    }

    fn current_refresh_token(&self) -> Option<&str> {
        self.cached.as_ref().and_then(|r| r.refresh_token.as_deref())
    }
}

/// Token status reported to the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    /// A usable (non-expiring) access token is stored.
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
    pub has_refresh_token: bool,
    /// The provider refused the stored grant; only a new authorization helps.
    pub needs_reauthorization: bool,
}

/// Serves a non-expired access token to callers.
///
/// At most one provider refresh call is outstanding per manager. Concurrent
/// callers that find the token unusable attach to the pending refresh and
/// receive its outcome.
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    provider: Arc<dyn OAuthProvider>,
    clock: Arc<dyn Clock>,
    buffer_secs: u64,
    local: Mutex<Local>,
    inflight: Mutex<Option<InFlight>>,
    next_flight: AtomicU64,
    next_write: AtomicU64,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        provider: Arc<dyn OAuthProvider>,
        clock: Arc<dyn Clock>,
        buffer: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            provider,
            clock,
            buffer_secs: buffer.as_secs(),
            local: Mutex::new(Local::default()),
            inflight: Mutex::new(None),
            next_flight: AtomicU64::new(1),
            next_write: AtomicU64::new(1),
        })
    }

    /// Return a usable access token, refreshing it first when needed.
    pub async fn get_valid_access_token(self: &Arc<Self>) -> Result<String, TokenError> {
        let rejected = self.local.lock().rejected();
        if let Some(err) = rejected {
            return Err(err);
        }

        let record = self.load().await;
        if let Some(token) = record
            .as_ref()
            .and_then(|r| r.usable_token(self.clock.now_secs(), self.buffer_secs))
        {
            return Ok(token.to_owned());
        }

        self.join_refresh(false).await
    }

    /// Exchange the stored refresh token for a new access token, even when the
    /// current one is still usable.
    pub async fn refresh(self: &Arc<Self>) -> Result<String, TokenError> {
        let rejected = self.local.lock().rejected();
        if let Some(err) = rejected {
            return Err(err);
        }
        self.join_refresh(true).await
    }

    /// Exchange an authorization code for the initial token pair.
    pub async fn authorize(&self, code: &str) -> Result<TokenStatus, TokenError> {
        let grant = self.provider.exchange_code(code).await.map_err(|e| match e {
            ProviderError::Network(msg) => {
                tracing::warn!(err = %msg, "authorization code exchange failed");
                TokenError::TransientNetwork(msg)
            }
            ProviderError::Rejected(msg) => {
                tracing::warn!(err = %msg, "authorization code rejected");
                TokenError::ProviderRejected(msg)
            }
        })?;

        let update = TokenUpdate {
            access_token: grant.access_token,
            refresh_token: Some(grant.refresh_token),
            expires_at: self.clock.now_secs().saturating_add(grant.expires_in),
        };
        let record = self.persist(update).await;
        self.local.lock().rejection = None;
        tracing::info!(expires_in = grant.expires_in, "provider authorized, tokens stored");
        Ok(self.status_of(Some(&record)))
    }

    /// Report the current token status without contacting the provider.
    pub async fn status(&self) -> TokenStatus {
        let record = self.load().await;
        self.status_of(record.as_ref())
    }

    /// Proactively keep the token fresh every `every`.
    ///
    /// Ticks go through [`Self::get_valid_access_token`], so any number of
    /// tickers share the single-flight guard with request-path callers.
    pub fn spawn_refresh_ticker(
        self: &Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await; // Consume the immediate first tick.
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        match manager.get_valid_access_token().await {
                            Ok(_) => tracing::debug!("refresh tick: token valid"),
                            Err(TokenError::AuthRequired(reason)) => {
                                tracing::debug!(reason = %reason, "refresh tick: provider not connected");
                            }
                            Err(e) => tracing::warn!(err = %e, "refresh tick failed"),
                        }
                    }
                }
            }
        })
    }

    /// Attach to the in-flight refresh, starting one if none is pending.
    async fn join_refresh(self: &Arc<Self>, force: bool) -> Result<String, TokenError> {
        let outcome = {
            let mut slot = self.inflight.lock();
            match slot.as_ref() {
                Some(flight) => flight.outcome.clone(),
                None => {
                    let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let manager = Arc::clone(self);
                    // Detached: a dropped waiter never aborts exchange + persist.
                    let handle = tokio::spawn(async move {
                        let result = manager.run_refresh(force).await;
                        manager.finish_flight(id);
                        result
                    });
                    let outcome = async move {
                        handle.await.unwrap_or_else(|e| {
                            Err(TokenError::TransientNetwork(format!("refresh task failed: {e}")))
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some(InFlight { id, outcome: outcome.clone() });
                    outcome
                }
            }
        };
        outcome.await
    }

    fn finish_flight(&self, id: u64) {
        let mut slot = self.inflight.lock();
        if slot.as_ref().is_some_and(|f| f.id == id) {
            *slot = None;
        }
    }

    async fn run_refresh(&self, force: bool) -> Result<String, TokenError> {
        let record = self.load().await;

        // Callers that raced past the first check find the fresh token here.
        if !force {
            if let Some(token) = record
                .as_ref()
                .and_then(|r| r.usable_token(self.clock.now_secs(), self.buffer_secs))
            {
                return Ok(token.to_owned());
            }
        }

        let Some(refresh_token) = record.and_then(|r| r.refresh_token) else {
            tracing::info!("no refresh token stored, authorization required");
            return Err(TokenError::AuthRequired("no refresh token stored".to_owned()));
        };

        tracing::debug!("refreshing access token");
        match self.provider.exchange_refresh_token(&refresh_token).await {
            Ok(grant) => {
                let update = TokenUpdate {
                    access_token: grant.access_token.clone(),
                    refresh_token: grant.refresh_token,
                    expires_at: self.clock.now_secs().saturating_add(grant.expires_in),
                };
                self.persist(update).await;
                tracing::info!(expires_in = grant.expires_in, "access token refreshed");
                Ok(grant.access_token)
            }
            Err(ProviderError::Network(msg)) => {
                tracing::warn!(err = %msg, "token refresh failed, provider unreachable");
                Err(TokenError::TransientNetwork(msg))
            }
            Err(ProviderError::Rejected(msg)) => {
                let mut local = self.local.lock();
                // An authorization that landed meanwhile replaced the refused grant.
                if local.current_refresh_token() == Some(refresh_token.as_str()) {
                    tracing::warn!(err = %msg, "token refresh rejected, re-authorization required");
                    local.rejection = Some(msg.clone());
                } else {
                    tracing::info!(err = %msg, "refresh rejected for a superseded grant, ignored");
                }
                Err(TokenError::ProviderRejected(msg))
            }
        }
    }

    /// Read the record, falling back to the in-memory copy when storage fails.
    ///
    /// A pending unsaved update is retried first and stays pending until a
    /// write of it succeeds, so concurrent readers keep serving `cached`.
    async fn load(&self) -> Option<TokenRecord> {
        let pending = self.local.lock().unsaved.clone();
        if let Some((seq, update)) = pending {
            return match self.store.upsert(update).await {
                Ok(record) => {
                    let mut local = self.local.lock();
                    if local.unsaved.as_ref().is_some_and(|(s, _)| *s == seq) {
                        tracing::info!("persisted previously unsaved token");
                        local.unsaved = None;
                        local.cached = Some(record);
                        local.revision += 1;
                    }
                    local.cached.clone()
                }
                Err(e) => {
                    tracing::debug!(err = %e, "token store still unavailable");
                    self.local.lock().cached.clone()
                }
            };
        }

        let revision = self.local.lock().revision;
        match self.store.get().await {
            Ok(record) => {
                let mut local = self.local.lock();
                // A persist finished while reading; memory is newer.
                if local.unsaved.is_some() || local.revision != revision {
                    return local.cached.clone();
                }
                local.cached = record.clone();
                record
            }
            Err(e) => {
                tracing::warn!(err = %e, "token store unavailable, using in-memory copy");
                self.local.lock().cached.clone()
            }
        }
    }

    /// Write an update, keeping it in memory when the store refuses it.
    async fn persist(&self, mut update: TokenUpdate) -> TokenRecord {
        // Carry a rotated refresh token from a refused earlier write.
        if update.refresh_token.is_none() {
            update.refresh_token =
                self.local.lock().unsaved.as_ref().and_then(|(_, u)| u.refresh_token.clone());
        }
        let seq = self.next_write.fetch_add(1, Ordering::Relaxed);

        match self.store.upsert(update.clone()).await {
            Ok(record) => {
                let mut local = self.local.lock();
                if local.unsaved.as_ref().is_some_and(|(s, _)| *s < seq) {
                    local.unsaved = None;
                }
                if local.unsaved.is_none() {
                    local.cached = Some(record.clone());
                    local.revision += 1;
                }
                record
            }
            Err(e) => {
                tracing::warn!(err = %e, "failed to persist token, keeping in-memory copy");
                let mut local = self.local.lock();
                let record = local.cached.clone().unwrap_or_default().with_update(&update);
                local.cached = Some(record.clone());
                local.unsaved = Some((seq, update));
                local.revision += 1;
                record
            }
        }
    }

    fn status_of(&self, record: Option<&TokenRecord>) -> TokenStatus {
        let now = self.clock.now_secs();
        let needs_reauthorization = self.local.lock().rejection.is_some();
        match record {
            Some(r) => TokenStatus {
                connected: !needs_reauthorization && r.usable_token(now, self.buffer_secs).is_some(),
                expires_in_secs: r.expires_at.filter(|&at| at > now).map(|at| at - now),
                has_refresh_token: r.refresh_token.is_some(),
                needs_reauthorization,
            },
            None => TokenStatus {
                connected: false,
                expires_in_secs: None,
                has_refresh_token: false,
                needs_reauthorization,
            },
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth credential lifecycle for the media provider.
//!
//! One [`TokenRecord`] exists per deployment. The [`manager::TokenManager`]
//! serves a non-expired access token to callers, refreshing it through the
//! [`provider::OAuthProvider`] behind a single-flight guard.

pub mod login;
pub mod manager;
pub mod provider;

use std::fmt;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::persist::StorageUnavailable;

/// The singleton OAuth credential record.
///
/// Invariant: when `access_token` is present, `expires_at` is present.
#[derive(Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl TokenRecord {
    /// Return the access token if it stays valid for longer than `buffer_secs`.
    ///
    /// A token expiring exactly at `now + buffer` is already unusable.
    pub fn usable_token(&self, now_secs: u64, buffer_secs: u64) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        let expires_at = self.expires_at?;
        (now_secs.saturating_add(buffer_secs) < expires_at).then_some(token)
    }

    /// Apply an update in place. A missing refresh token keeps the stored one.
    pub fn apply(&mut self, update: &TokenUpdate) {
        self.access_token = Some(update.access_token.clone());
        self.expires_at = Some(update.expires_at);
        if let Some(ref rt) = update.refresh_token {
            self.refresh_token = Some(rt.clone());
        }
    }

    /// Return a copy of this record with `update` applied.
    pub fn with_update(mut self, update: &TokenUpdate) -> Self {
        self.apply(update);
        self
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token_set", &self.access_token.is_some())
            .field("refresh_token_set", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Fields written by an authorization or a refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenUpdate {
    pub access_token: String,
    /// `None` keeps the stored refresh token (providers may not rotate it).
    pub refresh_token: Option<String>,
    /// Expiry as epoch seconds.
    pub expires_at: u64,
}

impl fmt::Debug for TokenUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenUpdate")
            .field("refresh_token_set", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Failure outcomes of obtaining a usable access token.
///
/// `Clone` so a single in-flight refresh can hand the same outcome to every
/// caller attached to it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// No usable refresh token: the operator must connect the provider again.
    #[error("authorization required: {0}")]
    AuthRequired(String),
    /// The provider could not be reached. Callers may retry with backoff.
    #[error("provider unreachable: {0}")]
    TransientNetwork(String),
    /// The provider refused the grant. Permanent until re-authorization.
    #[error("provider rejected the grant: {0}")]
    ProviderRejected(String),
}

/// Persistence collaborator for the singleton [`TokenRecord`].
///
/// Object-safe for use as `Arc<dyn TokenStore>`.
pub trait TokenStore: Send + Sync {
    /// Load the record. `Ok(None)` means the provider was never connected.
    fn get(&self) -> BoxFuture<'_, Result<Option<TokenRecord>, StorageUnavailable>>;

    /// Create or update the record and return the stored result.
    fn upsert(&self, update: TokenUpdate) -> BoxFuture<'_, Result<TokenRecord, StorageUnavailable>>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::catalog::MediaCatalog;
use crate::hub::BroadcastHub;
use crate::settings::store::SettingsStore;
use crate::token::login::LoginStates;
use crate::token::manager::TokenManager;
use crate::token::provider::OAuthProvider;

/// Shared application state passed to all handlers via axum `State` extractor.
///
/// Constructed once at startup. The hub and stores live here rather than in
/// globals so tests can build isolated instances.
pub struct AppState {
    pub settings: Arc<SettingsStore>,
    pub tokens: Arc<TokenManager>,
    pub hub: Arc<BroadcastHub>,
    /// Pending provider logins awaiting their callback.
    pub logins: Arc<LoginStates>,
    pub provider: Arc<dyn OAuthProvider>,
    pub catalog: Arc<dyn MediaCatalog>,
    /// Bearer token required on admin routes. `None` disables the check.
    pub admin_token: Option<String>,
    pub shutdown: CancellationToken,
}

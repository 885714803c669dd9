// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod hub;
pub mod persist;
pub mod relay;
pub mod settings;
pub mod test_support;
pub mod token;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::catalog::{MediaCatalog, SpotifyCatalog};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::hub::BroadcastHub;
use crate::persist::{FileSettingsStore, FileTokenStore};
use crate::settings::store::SettingsStore;
use crate::token::login::{LoginStates, LOGIN_TTL};
use crate::token::manager::TokenManager;
use crate::token::provider::{OAuthProvider, SpotifyProvider};
use crate::transport::{build_router, AppState};

/// Run the server until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    std::fs::create_dir_all(&config.state_dir)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let provider: Arc<dyn OAuthProvider> =
        Arc::new(SpotifyProvider::new(config.provider_settings())?);
    let catalog: Arc<dyn MediaCatalog> = Arc::new(SpotifyCatalog::new(&config.api_url)?);

    let settings = Arc::new(SettingsStore::new(
        Arc::new(FileSettingsStore::new(&config.state_dir)),
        Arc::clone(&clock),
    ));
    let tokens = TokenManager::new(
        Arc::new(FileTokenStore::new(&config.state_dir)),
        Arc::clone(&provider),
        Arc::clone(&clock),
        config.refresh_buffer(),
    );
    let hub = BroadcastHub::new(config.subscriber_queue);

    let state = Arc::new(AppState {
        settings: Arc::clone(&settings),
        tokens: Arc::clone(&tokens),
        hub: Arc::clone(&hub),
        logins: Arc::new(LoginStates::new(clock, LOGIN_TTL)),
        provider,
        catalog,
        admin_token: config.admin_token.clone(),
        shutdown: shutdown.clone(),
    });

    let relay = relay::spawn_settings_relay(settings, hub, shutdown.clone());
    let ticker = config.refresh_tick().map(|every| {
        tracing::info!(every_secs = every.as_secs(), "proactive token refresh enabled");
        tokens.spawn_refresh_ticker(every, shutdown.clone())
    });

    {
        let sd = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received ctrl-c, shutting down");
                sd.cancel();
            }
        });
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        state_dir = %config.state_dir.display(),
        "encore listening"
    );

    let router = build_router(state);
    let sd = shutdown.clone();
    axum::serve(listener, router).with_graceful_shutdown(async move { sd.cancelled().await }).await?;

    shutdown.cancel();
    let _ = relay.await;
    if let Some(ticker) = ticker {
        let _ = ticker.await;
    }
    tracing::info!("encore stopped");
    Ok(())
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::hub::DEFAULT_QUEUE_CAPACITY;
use crate::token::provider::ProviderSettings;

/// Live media-selection broadcast server.
#[derive(Debug, Clone, Parser)]
#[command(name = "encore", version, about)]
pub struct Config {
    /// Host address to bind to.
    #[arg(long, default_value = "127.0.0.1", env = "ENCORE_HOST")]
    pub host: String,

    /// HTTP port to listen on.
    #[arg(long, default_value_t = 3000, env = "ENCORE_PORT")]
    pub port: u16,

    /// Bearer token required on admin routes.
    #[arg(long, env = "ENCORE_ADMIN_TOKEN")]
    pub admin_token: Option<String>,

    /// Directory holding token.json and settings.json.
    #[arg(long, default_value = ".encore", env = "ENCORE_STATE_DIR")]
    pub state_dir: PathBuf,

    /// OAuth client id registered with the provider.
    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret registered with the provider.
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Redirect URI registered with the provider. Defaults to this server's
    /// callback route.
    #[arg(long, env = "SPOTIFY_REDIRECT_URI")]
    pub redirect_uri: Option<String>,

    #[arg(long, default_value = "https://accounts.spotify.com/authorize", env = "SPOTIFY_AUTH_URL")]
    pub auth_url: String,

    #[arg(long, default_value = "https://accounts.spotify.com/api/token", env = "SPOTIFY_TOKEN_URL")]
    pub token_url: String,

    /// Web API base used for catalog search.
    #[arg(long, default_value = "https://api.spotify.com/v1", env = "SPOTIFY_API_URL")]
    pub api_url: String,

    /// Seconds before expiry at which an access token stops being served.
    #[arg(long, default_value_t = 300, env = "ENCORE_REFRESH_BUFFER_SECS")]
    pub refresh_buffer_secs: u64,

    /// Seconds between proactive refresh checks (0 disables).
    #[arg(long, default_value_t = 3000, env = "ENCORE_REFRESH_TICK_SECS")]
    pub refresh_tick_secs: u64,

    /// Frames buffered per viewer before pushes to it are dropped.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, env = "ENCORE_SUBSCRIBER_QUEUE")]
    pub subscriber_queue: usize,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "ENCORE_LOG_FORMAT")]
    pub log_format: String,

    /// Log level filter.
    #[arg(long, default_value = "info", env = "ENCORE_LOG_LEVEL")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.client_id.as_deref().is_none_or(str::is_empty) {
            anyhow::bail!("--client-id (SPOTIFY_CLIENT_ID) is required");
        }
        if self.client_secret.as_deref().is_none_or(str::is_empty) {
            anyhow::bail!("--client-secret (SPOTIFY_CLIENT_SECRET) is required");
        }
        if self.subscriber_queue == 0 {
            anyhow::bail!("--subscriber-queue must be at least 1");
        }
        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("invalid log format: {} (expected json or text)", self.log_format);
        }
        if self.admin_token.as_deref().is_some_and(str::is_empty) {
            anyhow::bail!("--admin-token must not be empty");
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn refresh_buffer(&self) -> Duration {
        Duration::from_secs(self.refresh_buffer_secs)
    }

    /// `None` when proactive refresh is disabled.
    pub fn refresh_tick(&self) -> Option<Duration> {
        (self.refresh_tick_secs > 0).then(|| Duration::from_secs(self.refresh_tick_secs))
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        let redirect_uri = self.redirect_uri.clone().unwrap_or_else(|| {
            format!("http://{}:{}/api/v1/auth/callback", self.host, self.port)
        });
        ProviderSettings {
            client_id: self.client_id.clone().unwrap_or_default(),
            client_secret: self.client_secret.clone().unwrap_or_default(),
            redirect_uri,
            auth_url: self.auth_url.clone(),
            token_url: self.token_url.clone(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth provider collaborator and the Spotify accounts implementation.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

/// Scopes requested when the operator connects the provider.
pub const DEFAULT_SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "user-read-playback-state",
    "user-modify-playback-state",
    "streaming",
    "playlist-read-private",
    "playlist-read-collaborative",
];

/// Result of exchanging an authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

/// Result of exchanging a refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub access_token: String,
    /// Present when the provider rotates the refresh token.
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

/// Classified provider failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Transport failure, timeout, throttling or a provider-side 5xx.
    #[error("network: {0}")]
    Network(String),
    /// The provider refused the request (revoked grant, reused code, bad client).
    #[error("rejected: {0}")]
    Rejected(String),
}

/// OAuth token endpoint collaborator.
///
/// Object-safe for use as `Arc<dyn OAuthProvider>`.
pub trait OAuthProvider: Send + Sync {
    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, Result<CodeGrant, ProviderError>>;

    fn exchange_refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshGrant, ProviderError>>;

    /// Build the URL the operator's browser is sent to, carrying `state`.
    fn authorization_url(&self, state: &str) -> String;
}

/// Standard OAuth2 token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// OAuth2 error body (`{"error": "invalid_grant", "error_description": ...}`).
#[derive(Debug, Clone, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client registration and endpoints for the Spotify accounts service.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
}

/// Spotify accounts service client.
pub struct SpotifyProvider {
    http: reqwest::Client,
    auth_url: Url,
    settings: ProviderSettings,
}

impl SpotifyProvider {
    pub fn new(settings: ProviderSettings) -> anyhow::Result<Self> {
        let auth_url = Url::parse(&settings.auth_url)?;
        Url::parse(&settings.token_url)?;
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { http, auth_url, settings })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ProviderError> {
        let resp = self
            .http
            .post(&self.settings.token_url)
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_failure(status, &text));
        }

        resp.json::<TokenResponse>()
            .await
            .map_err(|e| ProviderError::Network(format!("undecodable token response: {e}")))
    }
}

impl OAuthProvider for SpotifyProvider {
    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, Result<CodeGrant, ProviderError>> {
        async move {
            let token = self
                .token_request(&[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", self.settings.redirect_uri.as_str()),
                ])
                .await?;
            let refresh_token = token.refresh_token.ok_or_else(|| {
                ProviderError::Rejected("authorization grant carried no refresh token".to_owned())
            })?;
            Ok(CodeGrant {
                access_token: token.access_token,
                refresh_token,
                expires_in: token.expires_in,
            })
        }
        .boxed()
    }

    fn exchange_refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshGrant, ProviderError>> {
        async move {
            let token = self
                .token_request(&[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                ])
                .await?;
            Ok(RefreshGrant {
                access_token: token.access_token,
                refresh_token: token.refresh_token,
                expires_in: token.expires_in,
            })
        }
        .boxed()
    }

    fn authorization_url(&self, state: &str) -> String {
        build_authorization_url(&self.auth_url, &self.settings, state)
    }
}

/// Build the authorization-code URL with the default scopes.
pub fn build_authorization_url(auth_url: &Url, settings: &ProviderSettings, state: &str) -> String {
    let mut url = auth_url.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &settings.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &settings.redirect_uri)
        .append_pair("scope", &DEFAULT_SCOPES.join(" "))
        .append_pair("state", state);
    url.into()
}

/// Classify a non-success token endpoint response.
///
/// Throttling, timeouts and server errors are retryable; every other client
/// error means the grant or the client registration was refused.
pub fn classify_failure(status: StatusCode, body: &str) -> ProviderError {
    let detail = match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(err) => match err.error_description {
            Some(desc) => format!("{} ({status}): {desc}", err.error),
            None => format!("{} ({status})", err.error),
        },
        Err(_) if body.is_empty() => format!("status {status}"),
        Err(_) => format!("status {status}: {body}"),
    };

    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        ProviderError::Network(detail)
    } else {
        ProviderError::Rejected(detail)
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`Connector`] over the server's `/ws` push channel and settings endpoint.

use encore::settings::view::SettingsView;
use encore::transport::ws::ServerMessage;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use crate::agent::{Connector, PushStream, TransportError};

pub struct WsConnector {
    base: String,
    http: reqwest::Client,
}

impl WsConnector {
    /// `server` is the HTTP base URL, e.g. `http://127.0.0.1:3000`.
    pub fn new(server: &str) -> Result<Self, TransportError> {
        let base = server.trim_end_matches('/').to_owned();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(TransportError(format!("unsupported server URL: {server}")));
        }
        // reqwest is built without a default rustls provider.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError(format!("http client: {e}")))?;
        Ok(Self { base, http })
    }

    pub fn ws_url(&self) -> String {
        let rest = self.base.strip_prefix("http").unwrap_or(&self.base);
        format!("ws{rest}/ws")
    }

    pub fn settings_url(&self) -> String {
        format!("{}/api/v1/settings", self.base)
    }
}

/// Map one socket message to a pushed view, if it carries one.
pub fn decode_push(msg: Result<Message, String>) -> Option<Result<SettingsView, TransportError>> {
    match msg {
        Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
            Ok(ServerMessage::SettingUpdate { setting }) => Some(Ok(setting)),
            Ok(ServerMessage::Error { code, message }) => {
                tracing::warn!(code = %code, message = %message, "server error frame");
                None
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(err = %e, "undecodable frame");
                None
            }
        },
        Ok(Message::Close(_)) => Some(Err(TransportError("closed by server".to_owned()))),
        Ok(_) => None,
        Err(e) => Some(Err(TransportError(e))),
    }
}

impl Connector for WsConnector {
    fn connect(&self) -> BoxFuture<'_, Result<PushStream, TransportError>> {
        async move {
            let url = self.ws_url();
            let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| TransportError(format!("connect {url}: {e}")))?;
            tracing::debug!(url = %url, "websocket connected");
            let stream = socket
                .filter_map(|msg| std::future::ready(decode_push(msg.map_err(|e| e.to_string()))));
            Ok(stream.boxed())
        }
        .boxed()
    }

    fn pull_snapshot(&self) -> BoxFuture<'_, Result<SettingsView, TransportError>> {
        async move {
            let url = self.settings_url();
            let resp = self
                .http
                .get(&url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| TransportError(format!("GET {url}: {e}")))?;
            resp.json::<SettingsView>()
                .await
                .map_err(|e| TransportError(format!("decode settings: {e}")))
        }
        .boxed()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

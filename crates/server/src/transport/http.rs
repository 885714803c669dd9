// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers and their request/response types.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::catalog::{SearchQuery, SearchResults};
use crate::error::ErrorCode;
use crate::settings::view::derive_view;
use crate::settings::SettingsPatch;
use crate::token::provider::ProviderError;
use crate::transport::state::AppState;

/// Response for `GET /api/v1/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub subscribers: usize,
}

/// Query parameters of the provider redirect back to us.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Query parameters of `GET /api/v1/search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<u32>,
}

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse { status: "ok".to_owned(), subscribers: s.hub.connected() })
}

/// `GET /api/v1/settings`: current settings view (snapshot-on-join).
///
/// Never fails: unreadable storage yields the `available: false` default.
pub async fn get_settings(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(s.settings.read_view().await)
}

/// `PUT /api/v1/settings`: merge a partial update.
pub async fn put_settings(
    State(s): State<Arc<AppState>>,
    body: Result<Json<SettingsPatch>, JsonRejection>,
) -> Response {
    let Json(patch) = match body {
        Ok(b) => b,
        Err(e) => return ErrorCode::MalformedInput.to_http_response(e.body_text()).into_response(),
    };
    match s.settings.write(patch).await {
        Ok(record) => Json(derive_view(&record)).into_response(),
        Err(e) => {
            let code = ErrorCode::from(&e);
            if code != ErrorCode::MalformedInput {
                tracing::warn!(err = %e, "settings write failed");
            }
            code.to_http_response(e.to_string()).into_response()
        }
    }
}

/// `GET /api/v1/auth/status`
pub async fn auth_status(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(s.tokens.status().await)
}

/// `POST /api/v1/auth/refresh`: force a token refresh.
pub async fn auth_refresh(State(s): State<Arc<AppState>>) -> Response {
    match s.tokens.refresh().await {
        Ok(_) => Json(s.tokens.status().await).into_response(),
        Err(e) => ErrorCode::from(&e).to_http_response(e.to_string()).into_response(),
    }
}

/// `GET /api/v1/auth/login`: redirect the operator to the provider.
pub async fn auth_login(State(s): State<Arc<AppState>>) -> Response {
    let state = s.logins.issue();
    tracing::info!("starting provider authorization");
    Redirect::temporary(&s.provider.authorization_url(&state)).into_response()
}

/// `GET /api/v1/auth/callback`: complete the authorization-code flow.
pub async fn auth_callback(
    State(s): State<Arc<AppState>>,
    Query(q): Query<CallbackQuery>,
) -> Response {
    let state_ok = q.state.as_deref().is_some_and(|st| s.logins.consume(st));
    if !state_ok {
        return ErrorCode::Unauthorized
            .to_http_response("unknown or expired login state")
            .into_response();
    }
    if let Some(err) = q.error {
        tracing::warn!(err = %err, "provider declined authorization");
        return ErrorCode::ProviderRejected
            .to_http_response(format!("authorization declined: {err}"))
            .into_response();
    }
    let Some(code) = q.code.filter(|c| !c.is_empty()) else {
        return ErrorCode::MalformedInput.to_http_response("missing code").into_response();
    };

    match s.tokens.authorize(&code).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => ErrorCode::from(&e).to_http_response(e.to_string()).into_response(),
    }
}

/// `GET /api/v1/search`: catalog search with the stored provider credential.
///
/// An expiring access token is refreshed before the search is sent.
pub async fn search(
    State(s): State<Arc<AppState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(e) => return ErrorCode::MalformedInput.to_http_response(e.body_text()).into_response(),
    };
    let query = match SearchQuery::parse(params.q.as_deref(), params.kind.as_deref(), params.limit) {
        Ok(q) => q,
        Err(e) => return ErrorCode::MalformedInput.to_http_response(e.to_string()).into_response(),
    };
    let access_token = match s.tokens.get_valid_access_token().await {
        Ok(t) => t,
        Err(e) => return ErrorCode::from(&e).to_http_response(e.to_string()).into_response(),
    };

    match s.catalog.search(&access_token, &query).await {
        Ok(items) => Json(SearchResults::new(&query, items)).into_response(),
        Err(e) => {
            tracing::warn!(err = %e, kind = %query.kind, "catalog search failed");
            let code = match e {
                ProviderError::Network(_) => ErrorCode::TransientNetwork,
                ProviderError::Rejected(_) => ErrorCode::SearchFailed,
            };
            code.to_http_response(e.to_string()).into_response()
        }
    }
}

/// `GET /api/v1/hub/stats`
pub async fn hub_stats(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(s.hub.stats())
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

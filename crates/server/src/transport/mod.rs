// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP and WebSocket surface.

pub mod auth;
pub mod http;
pub mod state;
pub mod ws;

pub use state::AppState;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the axum `Router` with all HTTP and WebSocket routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::health))
        .route("/api/v1/settings", get(http::get_settings).put(http::put_settings))
        .route("/api/v1/auth/status", get(http::auth_status))
        .route("/api/v1/auth/refresh", post(http::auth_refresh))
        .route("/api/v1/auth/login", get(http::auth_login))
        .route("/api/v1/auth/callback", get(http::auth_callback))
        .route("/api/v1/search", get(http::search))
        .route("/api/v1/hub/stats", get(http::hub_stats))
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

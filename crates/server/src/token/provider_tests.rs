// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use reqwest::{StatusCode, Url};

use super::{build_authorization_url, classify_failure, ProviderError, ProviderSettings};

fn settings() -> ProviderSettings {
    ProviderSettings {
        client_id: "client-123".to_owned(),
        client_secret: "secret".to_owned(),
        redirect_uri: "http://localhost:3000/api/v1/auth/callback".to_owned(),
        auth_url: "https://accounts.spotify.com/authorize".to_owned(),
        token_url: "https://accounts.spotify.com/api/token".to_owned(),
    }
}

#[yare::parameterized(
    server_error      = { 500, true },
    bad_gateway       = { 502, true },
    throttled         = { 429, true },
    request_timeout   = { 408, true },
    bad_request       = { 400, false },
    unauthorized      = { 401, false },
    forbidden         = { 403, false },
)]
fn classify_by_status(code: u16, transient: bool) -> anyhow::Result<()> {
    let status = StatusCode::from_u16(code)?;
    let err = classify_failure(status, "");
    assert_eq!(matches!(err, ProviderError::Network(_)), transient, "{code} -> {err:?}");
    Ok(())
}

#[test]
fn classify_includes_oauth_error_description() {
    let body = r#"{"error":"invalid_grant","error_description":"Refresh token revoked"}"#;
    let err = classify_failure(StatusCode::BAD_REQUEST, body);
    match err {
        ProviderError::Rejected(msg) => {
            assert!(msg.contains("invalid_grant"), "{msg}");
            assert!(msg.contains("Refresh token revoked"), "{msg}");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn classify_keeps_unstructured_body() {
    let err = classify_failure(StatusCode::SERVICE_UNAVAILABLE, "upstream down");
    assert_eq!(err, ProviderError::Network("status 503 Service Unavailable: upstream down".to_owned()));
}

#[test]
fn authorization_url_carries_client_scope_and_state() -> anyhow::Result<()> {
    let s = settings();
    let url = build_authorization_url(&Url::parse(&s.auth_url)?, &s, "st4te");
    let parsed = Url::parse(&url)?;
    let pairs: std::collections::HashMap<String, String> =
        parsed.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();

    assert_eq!(parsed.host_str(), Some("accounts.spotify.com"));
    assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-123"));
    assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
    assert_eq!(pairs.get("state").map(String::as_str), Some("st4te"));
    assert_eq!(pairs.get("redirect_uri").map(String::as_str), Some(s.redirect_uri.as_str()));
    let scope = pairs.get("scope").cloned().unwrap_or_default();
    assert!(scope.contains("streaming"), "{scope}");
    assert!(scope.contains("playlist-read-private"), "{scope}");
    Ok(())
}

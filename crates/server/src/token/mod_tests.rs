// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{TokenRecord, TokenUpdate};

fn record(expires_at: u64) -> TokenRecord {
    TokenRecord {
        access_token: Some("A1".to_owned()),
        refresh_token: Some("R1".to_owned()),
        expires_at: Some(expires_at),
    }
}

#[yare::parameterized(
    expires_at_buffer_boundary  = { 1_000 + 300, None },
    one_second_past_boundary    = { 1_000 + 300 + 1, Some("A1") },
    well_in_the_future          = { 10_000, Some("A1") },
    already_expired             = { 900, None },
)]
fn usable_token_boundary(expires_at: u64, expected: Option<&str>) {
    assert_eq!(record(expires_at).usable_token(1_000, 300), expected);
}

#[test]
fn missing_access_token_is_unusable() {
    let rec = TokenRecord { access_token: None, ..record(10_000) };
    assert_eq!(rec.usable_token(1_000, 300), None);
}

#[test]
fn update_without_refresh_token_keeps_stored_one() {
    let update =
        TokenUpdate { access_token: "A2".to_owned(), refresh_token: None, expires_at: 5_000 };
    let rec = record(1_000).with_update(&update);
    assert_eq!(rec.access_token.as_deref(), Some("A2"));
    assert_eq!(rec.refresh_token.as_deref(), Some("R1"));
    assert_eq!(rec.expires_at, Some(5_000));
}

#[test]
fn update_with_rotated_refresh_token_replaces_it() {
    let update = TokenUpdate {
        access_token: "A2".to_owned(),
        refresh_token: Some("R2".to_owned()),
        expires_at: 5_000,
    };
    let rec = TokenRecord::default().with_update(&update);
    assert_eq!(rec.refresh_token.as_deref(), Some("R2"));
}

#[test]
fn debug_output_hides_secrets() {
    let out = format!("{:?}", record(1_000));
    assert!(!out.contains("A1"), "debug leaked access token: {out}");
    assert!(!out.contains("R1"), "debug leaked refresh token: {out}");
    assert!(out.contains("expires_at"));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::{generate_state, LoginStates, LOGIN_TTL, MAX_PENDING_LOGINS};
use crate::test_support::ManualClock;

#[test]
fn state_is_url_safe_and_unique() {
    let a = generate_state();
    let b = generate_state();
    assert_eq!(a.len(), 43);
    assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'), "{a}");
    assert_ne!(a, b);
}

#[test]
fn state_is_single_use() {
    let clock = Arc::new(ManualClock::at_secs(1_000));
    let logins = LoginStates::new(clock, LOGIN_TTL);
    let state = logins.issue();
    assert!(logins.consume(&state));
    assert!(!logins.consume(&state));
}

#[test]
fn unknown_state_is_refused() {
    let logins = LoginStates::new(Arc::new(ManualClock::at_secs(1_000)), LOGIN_TTL);
    assert!(!logins.consume("forged"));
}

#[test]
fn expired_state_is_refused() {
    let clock = Arc::new(ManualClock::at_secs(1_000));
    let logins = LoginStates::new(clock.clone(), LOGIN_TTL);
    let state = logins.issue();
    clock.advance_secs(LOGIN_TTL.as_secs());
    assert!(!logins.consume(&state));
}

#[test]
fn issue_prunes_expired_states() {
    let clock = Arc::new(ManualClock::at_secs(1_000));
    let logins = LoginStates::new(clock.clone(), LOGIN_TTL);
    logins.issue();
    logins.issue();
    clock.advance_secs(LOGIN_TTL.as_secs() + 1);
    logins.issue();
    assert_eq!(logins.pending(), 1);
}

#[test]
fn issue_beyond_cap_evicts_oldest() {
    let clock = Arc::new(ManualClock::at_secs(1_000));
    let logins = LoginStates::new(clock.clone(), LOGIN_TTL);
    let oldest = logins.issue();
    clock.advance_ms(1);
    let second = logins.issue();
    for _ in 0..(MAX_PENDING_LOGINS * 4) {
        logins.issue();
    }
    assert_eq!(logins.pending(), MAX_PENDING_LOGINS);
    assert!(!logins.consume(&oldest));
    assert!(!logins.consume(&second));

    let newest = logins.issue();
    assert_eq!(logins.pending(), MAX_PENDING_LOGINS);
    assert!(logins.consume(&newest));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending authorization-code logins keyed by their CSRF `state`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use rand::Rng;

use crate::clock::Clock;

/// How long an issued `state` stays redeemable.
pub const LOGIN_TTL: Duration = Duration::from_secs(600);

/// Most states kept at once. Issuing past this evicts the oldest.
pub const MAX_PENDING_LOGINS: usize = 32;

/// Generate a random state parameter (32 bytes, 43 URL-safe chars).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Issued login states awaiting their provider callback.
pub struct LoginStates {
    clock: Arc<dyn Clock>,
    ttl_ms: u64,
    /// `(state, issued-at epoch ms)`, oldest first.
    pending: Mutex<VecDeque<(String, u64)>>,
}

impl LoginStates {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { clock, ttl_ms: ttl.as_millis() as u64, pending: Mutex::new(VecDeque::new()) }
    }

    /// Issue a fresh state, dropping any that already expired.
    pub fn issue(&self) -> String {
        let now = self.clock.now_ms();
        let state = generate_state();
        let mut pending = self.pending.lock();
        pending.retain(|(_, issued)| now.saturating_sub(*issued) < self.ttl_ms);
        while pending.len() >= MAX_PENDING_LOGINS {
            pending.pop_front();
        }
        pending.push_back((state.clone(), now));
        if pending.len() == MAX_PENDING_LOGINS {
            tracing::debug!(cap = MAX_PENDING_LOGINS, "pending logins at capacity");
        }
        state
    }

    /// Redeem `state`. Each state is accepted at most once and only before it
    /// expires.
    pub fn consume(&self, state: &str) -> bool {
        let now = self.clock.now_ms();
        let mut pending = self.pending.lock();
        let Some(pos) = pending.iter().position(|(s, _)| s == state) else {
            return false;
        };
        match pending.remove(pos) {
            Some((_, issued)) => now.saturating_sub(issued) < self.ttl_ms,
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
#[path = "login_tests.rs"]
mod tests;

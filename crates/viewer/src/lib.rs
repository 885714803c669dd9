// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Viewer-side sync agent for the Encore settings feed.

pub mod agent;
pub mod client;

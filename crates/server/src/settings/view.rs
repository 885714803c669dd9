// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use super::{SelectionType, SettingsRecord};

const EMBED_BASE: &str = "https://open.spotify.com/embed";

/// Read-only projection of [`SettingsRecord`] sent to viewers.
///
/// The same shape is served by the snapshot query and carried by every push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsView {
    pub has_selection: bool,
    pub selection_type: SelectionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_reference: Option<String>,
    pub autoplay: bool,
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    pub updated_at: u64,
    /// `false` only on the sentinel served while storage is unreachable.
    pub available: bool,
}

impl SettingsView {
    /// Default view served when settings storage cannot be read.
    ///
    /// `updated_at` is zero so any real view wins over it.
    pub fn unavailable() -> Self {
        let defaults = SettingsRecord::default();
        Self {
            has_selection: false,
            selection_type: SelectionType::None,
            selection_uri: None,
            embed_reference: None,
            autoplay: defaults.autoplay,
            loop_playback: defaults.loop_playback,
            updated_at: 0,
            available: false,
        }
    }
}

/// Project a record into the view shape.
pub fn derive_view(record: &SettingsRecord) -> SettingsView {
    let has_selection =
        record.selection_type != SelectionType::None && record.selection_uri.is_some();
    let embed_reference = if has_selection {
        record.selection_uri.as_deref().and_then(|uri| embed_reference(record.selection_type, uri))
    } else {
        None
    };
    SettingsView {
        has_selection,
        selection_type: record.selection_type,
        selection_uri: record.selection_uri.clone(),
        embed_reference,
        autoplay: record.autoplay,
        loop_playback: record.loop_playback,
        updated_at: record.updated_at,
        available: true,
    }
}

/// Map `spotify:<kind>:<id>` to its embeddable player URL.
///
/// Returns `None` for anything else, including a kind that disagrees with
/// `selection_type`.
pub fn embed_reference(kind: SelectionType, uri: &str) -> Option<String> {
    let mut parts = uri.split(':');
    let (Some("spotify"), Some(uri_kind), Some(id), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    if uri_kind != kind.as_str() || kind == SelectionType::None {
        return None;
    }
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!("{EMBED_BASE}/{uri_kind}/{id}?utm_source=generator&theme=0"))
}

#[cfg(test)]
#[path = "view_tests.rs"]
mod tests;

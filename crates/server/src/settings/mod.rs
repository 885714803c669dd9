// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The singleton settings record and the admin patch applied to it.

pub mod store;
pub mod view;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::persist::StorageUnavailable;

/// Kind of media currently selected.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionType {
    #[default]
    None,
    Track,
    Playlist,
    Album,
}

impl SelectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Track => "track",
            Self::Playlist => "playlist",
            Self::Album => "album",
        }
    }
}

/// The authoritative configuration record.
///
/// Invariant: `selection_type == None` iff `selection_uri` is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsRecord {
    #[serde(default)]
    pub selection_type: SelectionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_uri: Option<String>,
    pub autoplay: bool,
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    /// Epoch milliseconds of the last write.
    pub updated_at: u64,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        Self {
            selection_type: SelectionType::None,
            selection_uri: None,
            autoplay: true,
            loop_playback: false,
            updated_at: 0,
        }
    }
}

impl SettingsRecord {
    /// Merge the supplied patch fields and restamp `updated_at`.
    ///
    /// The stamp never moves backwards and never repeats, even when the wall
    /// clock does.
    pub fn apply(&mut self, patch: &SettingsPatch, now_ms: u64) {
        if let Some(kind) = patch.selection_type {
            self.selection_type = kind;
            self.selection_uri = match kind {
                SelectionType::None => None,
                _ => patch.selection_uri.clone(),
            };
        }
        if let Some(autoplay) = patch.autoplay {
            self.autoplay = autoplay;
        }
        if let Some(looping) = patch.loop_playback {
            self.loop_playback = looping;
        }
        self.updated_at = now_ms.max(self.updated_at.saturating_add(1));
    }

    pub fn with_patch(mut self, patch: &SettingsPatch, now_ms: u64) -> Self {
        self.apply(patch, now_ms);
        self
    }
}

/// Partial update sent by the admin surface. Absent fields are left as-is.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_type: Option<SelectionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoplay: Option<bool>,
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_playback: Option<bool>,
}

impl SettingsPatch {
    /// Select a piece of media.
    pub fn select(kind: SelectionType, uri: impl Into<String>) -> Self {
        Self { selection_type: Some(kind), selection_uri: Some(uri.into()), ..Self::default() }
    }

    /// Clear the current selection.
    pub fn clear_selection() -> Self {
        Self { selection_type: Some(SelectionType::None), ..Self::default() }
    }

    /// Check the patch keeps the selection invariant intact.
    pub fn validate(&self) -> Result<(), String> {
        match (self.selection_type, self.selection_uri.as_deref()) {
            (None, None) => Ok(()),
            (None, Some(_)) => Err("selection_uri requires selection_type".to_owned()),
            (Some(SelectionType::None), Some(_)) => {
                Err("selection_type none cannot carry a selection_uri".to_owned())
            }
            (Some(SelectionType::None), None) => Ok(()),
            (Some(kind), None) => Err(format!("selection_type {} requires a selection_uri", kind.as_str())),
            (Some(_), Some(uri)) if uri.trim().is_empty() => {
                Err("selection_uri must not be empty".to_owned())
            }
            (Some(_), Some(uri)) if !uri.starts_with("spotify:") => {
                Err(format!("selection_uri must be a spotify: URI, got {uri:?}"))
            }
            (Some(_), Some(_)) => Ok(()),
        }
    }
}

/// Persistence collaborator for the singleton [`SettingsRecord`].
///
/// Object-safe for use as `Arc<dyn SettingsPersistence>`.
pub trait SettingsPersistence: Send + Sync {
    /// Load the record. `Ok(None)` means it was never created.
    fn get(&self) -> BoxFuture<'_, Result<Option<SettingsRecord>, StorageUnavailable>>;

    /// Merge `patch` into the stored record (creating it with defaults) and
    /// return the stored result.
    fn upsert(
        &self,
        patch: SettingsPatch,
        now_ms: u64,
    ) -> BoxFuture<'_, Result<SettingsRecord, StorageUnavailable>>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File persistence: one JSON file per singleton record, written atomically.

use std::io;
use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::settings::{SettingsPatch, SettingsPersistence, SettingsRecord};
use crate::token::{TokenRecord, TokenStore, TokenUpdate};

pub const TOKEN_FILE: &str = "token.json";
pub const SETTINGS_FILE: &str = "settings.json";

/// The persistence engine could not be read or written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("storage unavailable: {0}")]
pub struct StorageUnavailable(pub String);

impl From<io::Error> for StorageUnavailable {
    fn from(e: io::Error) -> Self {
        Self(e.to_string())
    }
}

impl From<serde_json::Error> for StorageUnavailable {
    fn from(e: serde_json::Error) -> Self {
        Self(format!("corrupt record: {e}"))
    }
}

/// Load a JSON record. A missing file is `Ok(None)`.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageUnavailable> {
    let contents = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save a JSON record atomically (write tmp + rename).
///
/// The tmp name is unique per process and call so concurrent saves never
/// share a partially written file.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageUnavailable> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let json = serde_json::to_string_pretty(value)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

/// [`TokenStore`] backed by `<state_dir>/token.json`.
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(state_dir: &Path) -> Self {
        Self { path: state_dir.join(TOKEN_FILE), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> BoxFuture<'_, Result<Option<TokenRecord>, StorageUnavailable>> {
        async move {
            let _guard = self.lock.lock();
            load(&self.path)
        }
        .boxed()
    }

    fn upsert(&self, update: TokenUpdate) -> BoxFuture<'_, Result<TokenRecord, StorageUnavailable>> {
        async move {
            let _guard = self.lock.lock();
            let record = load::<TokenRecord>(&self.path)?.unwrap_or_default().with_update(&update);
            save(&self.path, &record)?;
            Ok(record)
        }
        .boxed()
    }
}

/// [`SettingsPersistence`] backed by `<state_dir>/settings.json`.
pub struct FileSettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(state_dir: &Path) -> Self {
        Self { path: state_dir.join(SETTINGS_FILE), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsPersistence for FileSettingsStore {
    fn get(&self) -> BoxFuture<'_, Result<Option<SettingsRecord>, StorageUnavailable>> {
        async move {
            let _guard = self.lock.lock();
            load(&self.path)
        }
        .boxed()
    }

    fn upsert(
        &self,
        patch: SettingsPatch,
        now_ms: u64,
    ) -> BoxFuture<'_, Result<SettingsRecord, StorageUnavailable>> {
        async move {
            let _guard = self.lock.lock();
            let record =
                load::<SettingsRecord>(&self.path)?.unwrap_or_default().with_patch(&patch, now_ms);
            save(&self.path, &record)?;
            Ok(record)
        }
        .boxed()
    }
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;

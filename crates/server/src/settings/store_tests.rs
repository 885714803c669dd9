// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::{SettingsStore, WriteError};
use crate::settings::view::SettingsView;
use crate::settings::{SelectionType, SettingsPatch};
use crate::test_support::{ManualClock, MemorySettingsStore};

fn store() -> (Arc<MemorySettingsStore>, Arc<ManualClock>, SettingsStore) {
    let persistence = Arc::new(MemorySettingsStore::default());
    let clock = Arc::new(ManualClock::at_secs(1_700_000_000));
    let store = SettingsStore::new(persistence.clone(), clock.clone());
    (persistence, clock, store)
}

#[tokio::test]
async fn first_read_creates_defaults() -> anyhow::Result<()> {
    let (persistence, _clock, store) = store();
    let record = store.read().await?;
    assert!(record.autoplay);
    assert!(!record.loop_playback);
    assert_eq!(record.selection_type, SelectionType::None);
    assert_eq!(persistence.snapshot(), Some(record));
    Ok(())
}

#[tokio::test]
async fn selecting_a_track_keeps_defaults() -> anyhow::Result<()> {
    let (_p, _clock, store) = store();
    let record = store.write(SettingsPatch::select(SelectionType::Track, "spotify:track:abc")).await?;
    assert_eq!(record.selection_type, SelectionType::Track);
    assert_eq!(record.selection_uri.as_deref(), Some("spotify:track:abc"));
    assert!(record.autoplay);
    assert!(!record.loop_playback);
    Ok(())
}

#[tokio::test]
async fn write_then_read_keeps_unpatched_fields() -> anyhow::Result<()> {
    let (_p, clock, store) = store();
    store.write(SettingsPatch::select(SelectionType::Album, "spotify:album:x1")).await?;
    clock.advance_ms(5);
    store.write(SettingsPatch { autoplay: Some(false), ..SettingsPatch::default() }).await?;

    let record = store.read().await?;
    assert_eq!(record.selection_type, SelectionType::Album);
    assert_eq!(record.selection_uri.as_deref(), Some("spotify:album:x1"));
    assert!(!record.autoplay);
    Ok(())
}

#[tokio::test]
async fn malformed_patch_changes_nothing() -> anyhow::Result<()> {
    let (persistence, _clock, store) = store();
    let before = store.read().await?;
    let result = store.write(SettingsPatch {
        selection_type: Some(SelectionType::Track),
        ..SettingsPatch::default()
    });
    assert!(matches!(result.await, Err(WriteError::Malformed(_))));
    assert_eq!(persistence.snapshot(), Some(before));
    Ok(())
}

#[tokio::test]
async fn storage_failure_on_write_leaves_record() -> anyhow::Result<()> {
    let (persistence, _clock, store) = store();
    let before = store.read().await?;
    let mut changes = store.changes();
    persistence.set_fail_upsert(true);

    let result = store.write(SettingsPatch::clear_selection()).await;
    assert!(matches!(result, Err(WriteError::Storage(_))), "{result:?}");
    assert_eq!(persistence.snapshot(), Some(before));
    assert!(changes.try_recv().is_err(), "failed writes are not announced");
    Ok(())
}

#[tokio::test]
async fn read_failure_degrades_to_sentinel_view() {
    let (persistence, _clock, store) = store();
    persistence.set_fail_get(true);
    assert!(store.read().await.is_err());
    assert_eq!(store.read_view().await, SettingsView::unavailable());
}

#[tokio::test]
async fn writes_are_announced_in_order() -> anyhow::Result<()> {
    let (_p, _clock, store) = store();
    let mut changes = store.changes();
    let first = store.write(SettingsPatch::select(SelectionType::Track, "spotify:track:1")).await?;
    let second = store.write(SettingsPatch::select(SelectionType::Track, "spotify:track:2")).await?;

    assert_eq!(changes.recv().await?, first);
    assert_eq!(changes.recv().await?, second);
    assert!(second.updated_at > first.updated_at, "same-millisecond writes still order");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writes_are_announced_in_stamp_order() -> anyhow::Result<()> {
    let (_p, _clock, store) = store();
    let store = Arc::new(store);
    let mut changes = store.changes();
    let mut tasks = Vec::new();
    for i in 0..32 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            store.write(SettingsPatch { loop_playback: Some(i % 2 == 0), ..SettingsPatch::default() }).await
        }));
    }
    for task in tasks {
        task.await??;
    }

    let mut last = 0;
    for _ in 0..32 {
        let record = changes.recv().await?;
        assert!(record.updated_at > last, "{} announced after {last}", record.updated_at);
        last = record.updated_at;
    }
    Ok(())
}

#[tokio::test]
async fn concurrent_writes_all_land() -> anyhow::Result<()> {
    let (_p, _clock, store) = store();
    let store = Arc::new(store);
    let mut tasks = Vec::new();
    for i in 0..10 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            store.write(SettingsPatch { autoplay: Some(i % 2 == 0), ..SettingsPatch::default() }).await
        }));
    }
    let mut stamps = Vec::new();
    for task in tasks {
        stamps.push(task.await??.updated_at);
    }
    stamps.sort_unstable();
    stamps.dedup();
    assert_eq!(stamps.len(), 10, "every write got a distinct stamp");
    Ok(())
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync agents against an in-process server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use encore::settings::{SelectionType, SettingsPatch};
use encore::test_support::{spawn_http_server, AppStateBuilder};
use encore_viewer::agent::{AgentConfig, AgentSnapshot, SyncAgent, SyncState};
use encore_viewer::client::WsConnector;

const WAIT: Duration = Duration::from_secs(5);

fn fast_config(max_retries: u32) -> AgentConfig {
    AgentConfig {
        max_retries,
        backoff_initial: Duration::from_millis(5),
        backoff_max: Duration::from_millis(20),
    }
}

fn start_agent(
    addr: std::net::SocketAddr,
    config: AgentConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<(watch::Receiver<AgentSnapshot>, tokio::task::JoinHandle<AgentSnapshot>)> {
    let connector = Arc::new(WsConnector::new(&format!("http://{addr}"))?);
    let (agent, rx) = SyncAgent::new(connector, config);
    Ok((rx, tokio::spawn(agent.run(cancel.clone()))))
}

async fn wait_until(
    rx: &mut watch::Receiver<AgentSnapshot>,
    pred: impl FnMut(&AgentSnapshot) -> bool,
) -> anyhow::Result<AgentSnapshot> {
    let snap = tokio::time::timeout(WAIT, rx.wait_for(pred)).await??;
    Ok(snap.clone())
}

#[tokio::test]
async fn agent_syncs_then_follows_writes() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, _server) = spawn_http_server(state.clone()).await?;
    let cancel = CancellationToken::new();
    let (mut rx, task) = start_agent(addr, fast_config(3), &cancel)?;

    let snap = wait_until(&mut rx, |s| s.state == SyncState::Synced).await?;
    let initial = snap.view.ok_or_else(|| anyhow::anyhow!("synced without a view"))?;
    assert!(initial.available);
    assert!(!initial.has_selection);
    assert!(initial.autoplay);

    let record = state
        .settings
        .write(SettingsPatch::select(SelectionType::Album, "spotify:album:4aawyAB9vmqN3uQ7FjRGTy"))
        .await?;

    let snap = wait_until(&mut rx, |s| {
        s.view.as_ref().is_some_and(|v| v.updated_at == record.updated_at)
    })
    .await?;
    let view = snap.view.ok_or_else(|| anyhow::anyhow!("view vanished"))?;
    assert!(view.has_selection);
    assert_eq!(view.selection_type, SelectionType::Album);
    assert_eq!(
        view.embed_reference.as_deref(),
        Some("https://open.spotify.com/embed/album/4aawyAB9vmqN3uQ7FjRGTy?utm_source=generator&theme=0")
    );

    cancel.cancel();
    let last = task.await?;
    assert_eq!(last.state, SyncState::Disconnected);
    assert_eq!(last.view.map(|v| v.updated_at), Some(record.updated_at));
    Ok(())
}

#[tokio::test]
async fn every_agent_converges_on_latest_write() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, _server) = spawn_http_server(state.clone()).await?;
    let cancel = CancellationToken::new();

    let mut agents = Vec::new();
    for _ in 0..3 {
        let (mut rx, task) = start_agent(addr, fast_config(3), &cancel)?;
        wait_until(&mut rx, |s| s.state == SyncState::Synced).await?;
        agents.push((rx, task));
    }

    state.settings.write(SettingsPatch { autoplay: Some(false), ..Default::default() }).await?;
    let last = state
        .settings
        .write(SettingsPatch { loop_playback: Some(true), ..Default::default() })
        .await?;

    for (rx, _) in agents.iter_mut() {
        let snap = wait_until(rx, |s| {
            s.view.as_ref().is_some_and(|v| v.updated_at == last.updated_at)
        })
        .await?;
        let view = snap.view.ok_or_else(|| anyhow::anyhow!("view vanished"))?;
        assert!(!view.autoplay);
        assert!(view.loop_playback);
    }

    cancel.cancel();
    for (_, task) in agents {
        task.await?;
    }
    Ok(())
}

#[tokio::test]
async fn server_loss_exhausts_retries_and_keeps_view() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, server) = spawn_http_server(state.clone()).await?;
    let (mut rx, task) = start_agent(addr, fast_config(2), &CancellationToken::new())?;

    let snap = wait_until(&mut rx, |s| s.state == SyncState::Synced).await?;
    let synced_at = snap.view.map(|v| v.updated_at);

    // Stop accepting, then close the open socket.
    server.abort();
    tokio::time::sleep(Duration::from_millis(50)).await;
    state.shutdown.cancel();

    let last = tokio::time::timeout(WAIT, task).await??;
    assert_eq!(last.state, SyncState::Disconnected);
    assert_eq!(last.view.map(|v| v.updated_at), synced_at);
    Ok(())
}

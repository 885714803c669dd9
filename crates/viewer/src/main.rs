// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use encore_viewer::agent::{AgentConfig, AgentSnapshot, SyncAgent, SyncState};
use encore_viewer::client::WsConnector;

/// Follow the Encore settings feed and log every change to the displayed view.
#[derive(Debug, Parser)]
#[command(name = "encore-viewer", version)]
struct Cli {
    /// Server base URL.
    #[arg(long, env = "ENCORE_SERVER", default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Consecutive reconnection attempts before giving up.
    #[arg(long, env = "ENCORE_MAX_RETRIES", default_value_t = 10)]
    max_retries: u32,

    #[arg(long, env = "ENCORE_BACKOFF_MS", default_value_t = 500)]
    backoff_ms: u64,

    #[arg(long, env = "ENCORE_LOG_FORMAT", default_value = "text")]
    log_format: String,

    #[arg(long, env = "ENCORE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let connector = match WsConnector::new(&cli.server) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    let config = AgentConfig {
        max_retries: cli.max_retries,
        backoff_initial: Duration::from_millis(cli.backoff_ms),
        ..AgentConfig::default()
    };
    let (agent, mut rx) = SyncAgent::new(connector, config);
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received ctrl-c, stopping");
                cancel.cancel();
            }
        });
    }

    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snap = rx.borrow_and_update().clone();
            log_snapshot(&snap);
        }
    });

    info!(server = %cli.server, "following settings");
    let last = agent.run(cancel.clone()).await;
    if !cancel.is_cancelled() && last.state == SyncState::Disconnected {
        error!("gave up reconnecting to {}", cli.server);
        std::process::exit(1);
    }
}

fn log_snapshot(snap: &AgentSnapshot) {
    match &snap.view {
        Some(view) => info!(
            state = %snap.state,
            selection = %view.selection_type.as_str(),
            uri = view.selection_uri.as_deref().unwrap_or("-"),
            embed = view.embed_reference.as_deref().unwrap_or("-"),
            autoplay = view.autoplay,
            loop_playback = view.loop_playback,
            updated_at = view.updated_at,
            available = view.available,
            "view"
        ),
        None => info!(state = %snap.state, "no view yet"),
    }
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match cli.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).init();
        }
    }
}

//! Event sync: binary entrypoint.
//! Loads settings, connects the publisher and runs one sync loop per source
//! until ctrl-c.

use std::collections::HashSet;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use event_sync::config::AppSettings;
use event_sync::{buffer_id, build_publisher, open_meetup_source, SyncLoop, SyncLoopCfg};

/// Compact logs by default, JSON lines with SYNC_LOG_JSON=1.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("event_sync=info,warn"));
    let json = std::env::var("SYNC_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = AppSettings::from_env();
    if let Some(addr) = &settings.metrics_addr {
        event_sync::metrics::install_exporter(addr)?;
        tracing::info!(%addr, "metrics exporter listening");
    }

    let publisher = build_publisher(&settings.publisher_config, settings.dry_run)?;
    if let Err(e) = publisher.connect().await {
        // Loops retry on their own schedule.
        tracing::error!(error = %e, "initial login failed");
    }

    let loop_cfg = SyncLoopCfg {
        poll_interval: settings.poll_interval,
        delete_old: settings.delete_old,
        reconnect_interval: settings.reconnect_interval,
    };

    let mut ids = HashSet::new();
    for path in &settings.source_configs {
        if !ids.insert(buffer_id(path)) {
            anyhow::bail!(
                "source config {} shares its file name with another source; buffers would collide",
                path.display()
            );
        }
    }

    let cancel = CancellationToken::new();
    let mut workers = Vec::new();
    for path in &settings.source_configs {
        let source = open_meetup_source(path, &settings.state_dir)?;
        let worker = SyncLoop::new(source, publisher.clone(), loop_cfg);
        workers.push(worker.spawn(cancel.child_token()));
    }
    tracing::info!(workers = workers.len(), "sync loops started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    cancel.cancel();
    for w in workers {
        if let Err(e) = w.await {
            tracing::warn!(error = %e, "worker ended abnormally");
        }
    }
    Ok(())
}

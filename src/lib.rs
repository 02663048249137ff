// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod publish;
pub mod sync;

// ---- Re-exports for stable public API ----
pub use crate::error::{SyncError, SyncResult};
pub use crate::ingest::{Record, Source};
pub use crate::ingest::buffer::buffer_id;
pub use crate::publish::Publisher;
pub use crate::sync::{CycleReport, SyncLoop, SyncLoopCfg};

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::config::source::SourceConfig;
use crate::ingest::providers::meetup::MeetupProvider;
use crate::ingest::FileBuffer;

/// Build a Meetup-backed source from its config file, buffering under
/// `state_dir` in a snapshot of its own (see [`FileBuffer::for_config`]).
pub fn open_meetup_source(config_path: &Path, state_dir: &Path) -> anyhow::Result<Source> {
    let cfg = SourceConfig::load_from_file(config_path)?;
    let buffer = FileBuffer::for_config(state_dir, config_path);
    let provider = MeetupProvider::new().context("building meetup http client")?;
    tracing::info!(
        source = %cfg.name,
        min_fetch_interval_secs = cfg.min_fetch_interval_secs,
        buffer = %buffer.path().display(),
        "source configured"
    );
    Ok(Source::new(cfg, Box::new(provider), Box::new(buffer)).with_config_path(config_path))
}

/// Publisher for the configured backend (in-memory when `dry_run`). Not yet connected.
pub fn build_publisher(publisher_config: &Path, dry_run: bool) -> anyhow::Result<Arc<Publisher>> {
    if dry_run {
        tracing::warn!("dry run: posts go to an in-memory backend");
        return Ok(Arc::new(Publisher::new(Arc::new(
            publish::mock::MockBackend::new(),
        ))));
    }
    let cfg = config::publisher::load_publisher_from(publisher_config)?;
    let client = publish::ghost::GhostClient::new(cfg).context("building ghost client")?;
    Ok(Arc::new(Publisher::new(Arc::new(client))))
}

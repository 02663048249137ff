// src/config/mod.rs
pub mod publisher;
pub mod source;

use std::path::PathBuf;
use std::time::Duration;

pub const ENV_SOURCE_CONFIGS: &str = "SYNC_SOURCE_CONFIGS";
pub const ENV_PUBLISHER_CONFIG: &str = "SYNC_PUBLISHER_CONFIG";
pub const ENV_STATE_DIR: &str = "SYNC_STATE_DIR";
pub const ENV_POLL_SECS: &str = "SYNC_POLL_SECS";
pub const ENV_DELETE_OLD: &str = "SYNC_DELETE_OLD";
pub const ENV_RECONNECT_SECS: &str = "SYNC_RECONNECT_SECS";
pub const ENV_METRICS_ADDR: &str = "SYNC_METRICS_ADDR";
pub const ENV_DRY_RUN: &str = "SYNC_DRY_RUN";

pub const DEFAULT_SOURCE_CONFIG: &str = "config/meetup.json";
pub const DEFAULT_PUBLISHER_CONFIG: &str = "config/publisher.toml";
pub const DEFAULT_STATE_DIR: &str = "state";

/// Process-level settings, read from the environment (after `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub source_configs: Vec<PathBuf>,
    pub publisher_config: PathBuf,
    pub state_dir: PathBuf,
    pub poll_interval: Duration,
    pub delete_old: bool,
    pub reconnect_interval: Duration,
    pub metrics_addr: Option<String>,
    pub dry_run: bool,
}

impl AppSettings {
    pub fn from_env() -> Self {
        let source_configs = std::env::var(ENV_SOURCE_CONFIGS)
            .ok()
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| vec![PathBuf::from(DEFAULT_SOURCE_CONFIG)]);

        let publisher_config = std::env::var(ENV_PUBLISHER_CONFIG)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_PUBLISHER_CONFIG));
        let state_dir = std::env::var(ENV_STATE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_DIR));

        Self {
            source_configs,
            publisher_config,
            state_dir,
            poll_interval: Duration::from_secs(env_secs(ENV_POLL_SECS, 5).max(1)),
            delete_old: env_flag(ENV_DELETE_OLD),
            reconnect_interval: Duration::from_secs(env_secs(ENV_RECONNECT_SECS, 600)),
            metrics_addr: std::env::var(ENV_METRICS_ADDR)
                .ok()
                .filter(|s| !s.trim().is_empty()),
            dry_run: env_flag(ENV_DRY_RUN),
        }
    }
}

fn env_secs(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

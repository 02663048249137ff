// src/config/publisher.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_request_timeout_secs() -> u64 {
    10
}

/// Ghost admin credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Blog root, e.g. `https://blog.example.org`
    pub server: String,
    pub client_id: String,
    /// "ENV" means: read from GHOST_CLIENT_SECRET
    pub client_secret: String,
    pub user: String,
    /// "ENV" means: read from GHOST_PASSWORD
    pub password: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Load publisher settings from TOML or JSON (picked by extension, then by
/// trying both).
pub fn load_publisher_from(path: &Path) -> Result<PublisherConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading publisher config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mut cfg = parse_publisher(&content, ext.as_str())?;
    resolve_env_secrets(&mut cfg)?;

    cfg.server = cfg.server.trim_end_matches('/').to_string();
    if cfg.server.is_empty() {
        return Err(anyhow!("publisher config: empty server"));
    }
    Ok(cfg)
}

fn parse_publisher(s: &str, hint_ext: &str) -> Result<PublisherConfig> {
    if hint_ext == "toml" {
        return toml::from_str(s).context("parsing publisher toml");
    }
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing publisher json");
    }
    if let Ok(v) = serde_json::from_str(s) {
        return Ok(v);
    }
    toml::from_str(s).map_err(|_| anyhow!("unsupported publisher config format"))
}

fn resolve_env_secrets(cfg: &mut PublisherConfig) -> Result<()> {
    if cfg.client_secret.trim().eq_ignore_ascii_case("env") {
        cfg.client_secret = std::env::var("GHOST_CLIENT_SECRET")
            .map_err(|_| anyhow!("Missing GHOST_CLIENT_SECRET env var"))?;
    }
    if cfg.password.trim().eq_ignore_ascii_case("env") {
        cfg.password = std::env::var("GHOST_PASSWORD")
            .map_err(|_| anyhow!("Missing GHOST_PASSWORD env var"))?;
    }
    Ok(())
}

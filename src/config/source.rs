// src/config/source.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SyncResult;

fn default_request_timeout_secs() -> u64 {
    10
}
fn default_min_fetch_interval_secs() -> i64 {
    3600
}

/// Per-source settings, read once when the source is built. `last_fetch_at`
/// is the only field written back (after every fetch attempt).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Source type, also used as the tag name on the blog.
    pub name: String,
    /// URL template with `{topic}`, `{radius}` and `{key}` placeholders.
    pub service_url: String,
    /// "ENV" means: read from MEETUP_API_KEY
    pub api_key: String,
    #[serde(default)]
    pub topic_category: String,
    #[serde(default)]
    pub radius: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_min_fetch_interval_secs")]
    pub min_fetch_interval_secs: i64,
    /// Image attached to the source's tag when it is first created.
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub last_fetch_at: Option<DateTime<Utc>>,
    /// `api_key` after "ENV" resolution; never written back to disk.
    #[serde(skip)]
    resolved_api_key: Option<String>,
}

impl SourceConfig {
    /// Config with defaults and no API key; mainly for tests and tooling.
    pub fn new(name: impl Into<String>, service_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_url: service_url.into(),
            api_key: String::new(),
            topic_category: String::new(),
            radius: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            min_fetch_interval_secs: default_min_fetch_interval_secs(),
            featured_image: None,
            last_fetch_at: None,
            resolved_api_key: None,
        }
    }

    pub fn with_min_fetch_interval(mut self, secs: i64) -> Self {
        self.min_fetch_interval_secs = secs;
        self
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading source config {}", path.display()))?;
        let mut cfg: SourceConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing source config {}", path.display()))?;

        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            let key = std::env::var("MEETUP_API_KEY")
                .map_err(|_| anyhow::anyhow!("Missing MEETUP_API_KEY env var"))?;
            cfg.resolved_api_key = Some(key);
        }
        if cfg.name.trim().is_empty() {
            anyhow::bail!("source config {} has an empty name", path.display());
        }
        Ok(cfg)
    }

    pub fn effective_api_key(&self) -> &str {
        self.resolved_api_key.as_deref().unwrap_or(&self.api_key)
    }

    /// Render `service_url` for the current settings.
    pub fn request_url(&self) -> String {
        self.service_url
            .replace("{topic}", &self.topic_category)
            .replace("{radius}", &self.radius)
            .replace("{key}", self.effective_api_key())
    }

    /// Atomic overwrite (tmp file + rename).
    pub async fn save(&self, path: &Path) -> SyncResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

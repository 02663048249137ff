// src/ingest/types.rs
use chrono::{DateTime, Utc};

use crate::config::source::SourceConfig;
use crate::error::SyncResult;

/// One harvested event, as exchanged between a source and the publisher.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Record {
    pub key: String, // source-unique, doubles as the watermark cursor
    pub occurs_at: DateTime<Utc>,
    pub title: String,
    pub summary: String,
    pub body: String, // markdown / plain text
    pub origin_url: Option<String>,
}

/// Upstream API seam. Implementations fetch and map the raw payload; they do
/// not gate, buffer or persist anything.
///
/// Records come back in upstream order (newest first).
#[async_trait::async_trait]
pub trait UpstreamFetch: Send + Sync {
    async fn fetch(&self, cfg: &SourceConfig) -> SyncResult<Vec<Record>>;
    fn name(&self) -> &'static str;
}

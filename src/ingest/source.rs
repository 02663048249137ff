// src/ingest/source.rs
use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::config::source::SourceConfig;
use crate::ingest::buffer::SourceBuffer;
use crate::ingest::gate::RateGate;
use crate::ingest::types::{Record, UpstreamFetch};

/// Records strictly after the one whose key is `k`.
///
/// An absent or unknown `k` yields everything: a cursor that aged out of the
/// window means "resync", never "nothing new".
pub fn records_after<'a>(records: &'a [Record], k: Option<&str>) -> &'a [Record] {
    match k.and_then(|k| records.iter().position(|r| r.key == k)) {
        Some(i) => &records[i + 1..],
        None => records,
    }
}

/// Drop repeated keys, first occurrence wins.
pub fn dedup_keys(records: Vec<Record>) -> Vec<Record> {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.key.clone()))
        .collect()
}

/// Rate-gated upstream with a last-known-good buffer.
pub struct Source {
    config: SourceConfig,
    config_path: Option<PathBuf>,
    gate: RateGate,
    fetcher: Box<dyn UpstreamFetch>,
    buffer: Box<dyn SourceBuffer>,
}

impl Source {
    pub fn new(
        config: SourceConfig,
        fetcher: Box<dyn UpstreamFetch>,
        buffer: Box<dyn SourceBuffer>,
    ) -> Self {
        let gate = RateGate::new(config.min_fetch_interval_secs);
        Self {
            config,
            config_path: None,
            gate,
            fetcher,
            buffer,
        }
    }

    /// Persist `last_fetch_at` to `path` after every fetch attempt.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Source type name; the publisher tags posts with it.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub async fn get_all(&mut self) -> Vec<Record> {
        self.get_all_at(Utc::now()).await
    }

    /// All current records, oldest first.
    ///
    /// Inside the rate-gate window this is the buffer. Otherwise the upstream
    /// is called; a failed call yields an empty list and leaves the buffer
    /// alone, a successful one (even with zero events) replaces it.
    pub async fn get_all_at(&mut self, now: DateTime<Utc>) -> Vec<Record> {
        crate::metrics::ensure_described();

        if !self.gate.allowed(now, self.config.last_fetch_at) {
            counter!("sync_fetch_skipped_total").increment(1);
            tracing::debug!(target: "ingest", source = %self.config.name, "rate gate closed, serving buffer");
            return self.buffer.read().await;
        }

        counter!("sync_fetch_total").increment(1);
        let result = self.fetcher.fetch(&self.config).await;

        // Stamp the attempt whatever its outcome so a failing endpoint is not hammered.
        self.config.last_fetch_at = Some(now);
        self.persist_config().await;

        match result {
            Ok(mut records) => {
                // upstream lists newest first
                records.reverse();
                let records = dedup_keys(records);
                counter!("sync_records_fetched_total").increment(records.len() as u64);
                tracing::info!(
                    target: "ingest",
                    source = %self.config.name,
                    provider = self.fetcher.name(),
                    count = records.len(),
                    "fetched"
                );
                if let Err(e) = self.buffer.write(&records).await {
                    counter!("sync_buffer_write_errors_total").increment(1);
                    tracing::warn!(target: "ingest", source = %self.config.name, error = %e, "buffer write failed");
                }
                records
            }
            Err(e) => {
                counter!("sync_fetch_errors_total").increment(1);
                tracing::warn!(
                    target: "ingest",
                    source = %self.config.name,
                    provider = self.fetcher.name(),
                    error = %e,
                    "provider error"
                );
                Vec::new()
            }
        }
    }

    pub async fn has_updates(&mut self, k: Option<&str>) -> usize {
        self.has_updates_at(k, Utc::now()).await
    }

    /// Number of records after cursor `k`.
    pub async fn has_updates_at(&mut self, k: Option<&str>, now: DateTime<Utc>) -> usize {
        let content = self.get_all_at(now).await;
        records_after(&content, k).len()
    }

    pub async fn get_content(&mut self, k: Option<&str>) -> Vec<Record> {
        self.get_content_at(k, Utc::now()).await
    }

    /// Records after cursor `k`, oldest first.
    pub async fn get_content_at(&mut self, k: Option<&str>, now: DateTime<Utc>) -> Vec<Record> {
        let content = self.get_all_at(now).await;
        records_after(&content, k).to_vec()
    }

    async fn persist_config(&self) {
        let Some(path) = &self.config_path else {
            return;
        };
        if let Err(e) = self.config.save(path).await {
            counter!("sync_buffer_write_errors_total").increment(1);
            tracing::warn!(
                target: "ingest",
                source = %self.config.name,
                path = %path.display(),
                error = %e,
                "could not persist last_fetch_at"
            );
        }
    }
}

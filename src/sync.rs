// src/sync.rs
//! One worker per source: initial full publish, then cursor-driven catch-up.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ingest::gate::RateGate;
use crate::ingest::types::Record;
use crate::ingest::Source;
use crate::publish::{PublishOutcome, Publisher};

#[derive(Clone, Copy, Debug)]
pub struct SyncLoopCfg {
    pub poll_interval: Duration,
    /// Remove the source's existing posts before the initial publish.
    pub delete_old: bool,
    /// Minimum spacing between reconnect attempts while disconnected.
    pub reconnect_interval: Duration,
}

impl Default for SyncLoopCfg {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            delete_old: false,
            reconnect_interval: Duration::from_secs(600),
        }
    }
}

/// What happened to the records handed to the publisher in one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub attempted: usize,
    pub published: usize,
    pub skipped: usize,
    /// Transport, auth or session failures; may succeed on a later cycle.
    pub retryable: usize,
    /// Failures that repeat as long as the record and config stay the same.
    pub permanent: usize,
}

pub struct SyncLoop {
    source: Source,
    publisher: Arc<Publisher>,
    cfg: SyncLoopCfg,
    cursor: Option<String>,
    reconnect_gate: RateGate,
    last_reconnect_at: Option<DateTime<Utc>>,
    last_report: CycleReport,
}

impl SyncLoop {
    pub fn new(source: Source, publisher: Arc<Publisher>, cfg: SyncLoopCfg) -> Self {
        let reconnect_secs = i64::try_from(cfg.reconnect_interval.as_secs()).unwrap_or(i64::MAX);
        Self {
            source,
            publisher,
            cfg,
            cursor: None,
            reconnect_gate: RateGate::new(reconnect_secs),
            last_reconnect_at: None,
            last_report: CycleReport::default(),
        }
    }

    /// Key of the last record handed to the publisher.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Outcome of the latest bootstrap or poll that reached the publisher.
    pub fn last_report(&self) -> CycleReport {
        self.last_report
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Optional delete-by-tag, then publish everything the source has now.
    pub async fn bootstrap(&mut self, cancel: &CancellationToken) -> usize {
        if self.cfg.delete_old {
            let tag = self.source.name().to_string();
            // The initial publish runs either way.
            if let Err(e) = self.publisher.delete_posts(&tag).await {
                tracing::warn!(
                    target: "sync",
                    source = %tag,
                    error = %e,
                    retryable = e.is_retryable(),
                    "old posts not removed"
                );
            }
        }
        let records = self.source.get_all().await;
        tracing::info!(target: "sync", source = %self.source.name(), count = records.len(), "initial publish");
        self.publish_in_order(records, cancel).await
    }

    /// One steady-state cycle. Returns how many records were handed to the publisher.
    pub async fn poll_once(&mut self, cancel: &CancellationToken) -> usize {
        self.maybe_reconnect().await;
        gauge!("sync_last_poll_ts").set(Utc::now().timestamp() as f64);

        let pending = self.source.has_updates(self.cursor.as_deref()).await;
        if pending == 0 {
            tracing::trace!(target: "sync", source = %self.source.name(), "no updates");
            return 0;
        }
        let records = self.source.get_content(self.cursor.as_deref()).await;
        tracing::info!(target: "sync", source = %self.source.name(), pending, fetched = records.len(), "catching up");
        self.publish_in_order(records, cancel).await
    }

    /// Bootstrap, then poll every `poll_interval` until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(target: "sync", source = %self.source.name(), "running");
        self.maybe_reconnect().await;
        self.bootstrap(&cancel).await;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.cfg.poll_interval) => {}
            }
            self.poll_once(&cancel).await;
        }
        tracing::info!(target: "sync", source = %self.source.name(), cursor = ?self.cursor, "ended");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Publish oldest first, moving the cursor to each attempted record.
    /// Stops early (between records) once `cancel` fires.
    async fn publish_in_order(
        &mut self,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> usize {
        let tag = self.source.name().to_string();
        let image = self.source.config().featured_image.clone();
        let mut report = CycleReport::default();
        for record in records {
            if cancel.is_cancelled() {
                tracing::info!(target: "sync", source = %tag, "stop requested, leaving remaining records");
                break;
            }
            // A failure never stops the batch and the cursor moves on regardless.
            match self.publisher.publish(&tag, &record, image.as_deref()).await {
                Ok(PublishOutcome::Published { .. }) => report.published += 1,
                Ok(PublishOutcome::Skipped(_)) => report.skipped += 1,
                Err(e) if e.is_retryable() => {
                    report.retryable += 1;
                    counter!("sync_publish_retryable_total").increment(1);
                    tracing::warn!(target: "sync", source = %tag, key = %record.key, error = %e, "not published, transient");
                }
                Err(e) => {
                    report.permanent += 1;
                    counter!("sync_publish_permanent_total").increment(1);
                    tracing::error!(target: "sync", source = %tag, key = %record.key, error = %e, "not published");
                }
            }
            self.cursor = Some(record.key);
            report.attempted += 1;
        }
        if report.retryable + report.permanent > 0 {
            tracing::warn!(
                target: "sync",
                source = %tag,
                attempted = report.attempted,
                retryable = report.retryable,
                permanent = report.permanent,
                "cycle finished with failures"
            );
        }
        self.last_report = report;
        report.attempted
    }

    async fn maybe_reconnect(&mut self) {
        if self.publisher.is_connected().await {
            return;
        }
        let now = Utc::now();
        if !self.reconnect_gate.allowed(now, self.last_reconnect_at) {
            return;
        }
        self.last_reconnect_at = Some(now);
        if self.publisher.connect().await.is_err() {
            tracing::warn!(target: "sync", source = %self.source.name(), "publisher still disconnected");
        }
    }
}

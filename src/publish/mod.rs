//! Idempotent republishing of records as blog posts.
//!
//! One tag per source type, created on first use and cached. Posts carry that
//! tag so a source's posts can be removed in bulk. Backend failures are logged
//! and returned; they never stop the caller from moving on to the next record.

pub mod ghost;
pub mod mock;
pub mod types;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use metrics::counter;
use tokio::sync::{Mutex, RwLock};

use crate::error::{SyncError, SyncResult};
use crate::ingest::types::Record;
use types::{NewPost, PostBackend, Tag};

/// Admin API limit on post titles (characters).
pub const MAX_TITLE_CHARS: usize = 255;

/// How many published (tag, key) pairs are remembered for dedup.
pub const DEFAULT_DEDUP_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// key, title or summary is empty
    Incomplete,
    /// same key already posted under this tag by this publisher
    AlreadyPublished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { post_id: String },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub matched: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Cut to at most `MAX_TITLE_CHARS` characters.
pub fn truncate_title(title: &str) -> String {
    title.chars().take(MAX_TITLE_CHARS).collect()
}

/// Post body: the record body (summary when empty) plus a link back to the
/// original page when there is one.
pub fn render_body(record: &Record) -> String {
    let mut body = if record.body.trim().is_empty() {
        record.summary.clone()
    } else {
        record.body.clone()
    };
    if let Some(url) = record.origin_url.as_deref().filter(|u| !u.trim().is_empty()) {
        body.push_str(&format!("\n\n[Original Source]({url})"));
    }
    body
}

fn missing_field(record: &Record) -> Option<&'static str> {
    if record.key.trim().is_empty() {
        Some("key")
    } else if record.title.trim().is_empty() {
        Some("title")
    } else if record.summary.trim().is_empty() {
        Some("summary")
    } else {
        None
    }
}

/// (tag, key) pairs posted by this publisher, oldest evicted first.
#[derive(Debug)]
struct PublishedKeys {
    seen: HashSet<(String, String)>,
    order: VecDeque<(String, String)>,
    capacity: usize,
}

impl PublishedKeys {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn contains(&self, entry: &(String, String)) -> bool {
        self.seen.contains(entry)
    }

    fn insert(&mut self, entry: (String, String)) {
        if !self.seen.insert(entry.clone()) {
            return;
        }
        self.order.push_back(entry);
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
    }

    fn forget_tag(&mut self, tag: &str) {
        self.seen.retain(|(t, _)| t != tag);
        self.order.retain(|(t, _)| t != tag);
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

pub struct Publisher {
    backend: Arc<dyn PostBackend>,
    state: RwLock<SessionState>,
    connect_lock: Mutex<()>,
    /// Held across list-or-create so concurrent callers never create the same tag twice.
    tags: Mutex<HashMap<String, Tag>>,
    published: parking_lot::Mutex<PublishedKeys>,
}

impl Publisher {
    /// Starts disconnected; call `connect` before publishing.
    pub fn new(backend: Arc<dyn PostBackend>) -> Self {
        Self {
            backend,
            state: RwLock::new(SessionState::Disconnected),
            connect_lock: Mutex::new(()),
            tags: Mutex::new(HashMap::new()),
            published: parking_lot::Mutex::new(PublishedKeys::new(DEFAULT_DEDUP_CAPACITY)),
        }
    }

    /// Bound the dedup memory to `n` (tag, key) pairs (min 1).
    pub fn with_dedup_capacity(self, n: usize) -> Self {
        *self.published.lock() = PublishedKeys::new(n);
        self
    }

    /// Number of (tag, key) pairs currently remembered.
    pub fn remembered(&self) -> usize {
        self.published.lock().len()
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == SessionState::Connected
    }

    /// Log in to the backend. On failure the publisher stays disconnected and
    /// every operation is a logged no-op until a later `connect` succeeds.
    pub async fn connect(&self) -> SyncResult<()> {
        let _guard = self.connect_lock.lock().await;
        if self.is_connected().await {
            return Ok(());
        }

        *self.state.write().await = SessionState::Connecting;
        match self.backend.login().await {
            Ok(()) => {
                *self.state.write().await = SessionState::Connected;
                tracing::info!(target: "publish", backend = self.backend.name(), "connected");
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = SessionState::Disconnected;
                tracing::error!(target: "publish", backend = self.backend.name(), error = %e, "login failed");
                Err(e)
            }
        }
    }

    /// Create a post for `record` under the tag `source_tag`.
    ///
    /// `feature_image` is only used if the tag has to be created.
    pub async fn publish(
        &self,
        source_tag: &str,
        record: &Record,
        feature_image: Option<&str>,
    ) -> SyncResult<PublishOutcome> {
        crate::metrics::ensure_described();

        if let Some(missing) = missing_field(record) {
            counter!("publish_skipped_total").increment(1);
            tracing::info!(target: "publish", source = source_tag, key = %record.key, missing, "incomplete record, won't be published");
            return Ok(PublishOutcome::Skipped(SkipReason::Incomplete));
        }

        let dedup_key = (source_tag.to_string(), record.key.clone());
        let already = self.published.lock().contains(&dedup_key);
        if already {
            counter!("publish_skipped_total").increment(1);
            tracing::debug!(target: "publish", source = source_tag, key = %record.key, "already published");
            return Ok(PublishOutcome::Skipped(SkipReason::AlreadyPublished));
        }

        self.require_connected("publish").await?;

        match self.create_post(source_tag, record, feature_image).await {
            Ok(post_id) => {
                self.published.lock().insert(dedup_key);
                counter!("publish_posts_total").increment(1);
                tracing::info!(target: "publish", source = source_tag, key = %record.key, post_id = %post_id, "published");
                Ok(PublishOutcome::Published { post_id })
            }
            Err(e) => {
                counter!("publish_errors_total").increment(1);
                tracing::error!(target: "publish", source = source_tag, key = %record.key, error = %e, "publish failed");
                self.note_error(&e).await;
                Err(e)
            }
        }
    }

    async fn create_post(
        &self,
        source_tag: &str,
        record: &Record,
        feature_image: Option<&str>,
    ) -> SyncResult<String> {
        let tag = self.resolve_tag(source_tag, feature_image).await?;
        let post = NewPost {
            title: truncate_title(&record.title),
            custom_excerpt: record.summary.clone(),
            markdown: render_body(record),
            tags: vec![tag],
            feature_image: None,
            status: "published".to_string(),
            featured: false,
            page: false,
            locale: "en_US".to_string(),
            visibility: "public".to_string(),
        };
        Ok(self.backend.create_post(&post).await?.id)
    }

    /// Cached tag, else the first backend tag with this name, else a new one.
    async fn resolve_tag(&self, name: &str, feature_image: Option<&str>) -> SyncResult<Tag> {
        let mut cache = self.tags.lock().await;
        if let Some(tag) = cache.get(name) {
            return Ok(tag.clone());
        }

        let existing = self
            .backend
            .list_tags()
            .await?
            .into_iter()
            .find(|t| t.name == name);
        let tag = match existing {
            Some(t) => t,
            None => {
                tracing::info!(target: "publish", tag = name, "creating tag");
                self.backend.create_tag(name, feature_image).await?
            }
        };
        cache.insert(name.to_string(), tag.clone());
        Ok(tag)
    }

    /// Delete every post whose first tag is `source_tag`.
    ///
    /// All pages are listed before anything is deleted; if listing fails
    /// nothing is removed. Individual delete failures are logged and counted.
    pub async fn delete_posts(&self, source_tag: &str) -> SyncResult<DeleteReport> {
        crate::metrics::ensure_described();
        self.require_connected("delete_posts").await?;

        let ids = match self.collect_tagged(source_tag).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(target: "publish", source = source_tag, error = %e, "listing posts failed, nothing deleted");
                self.note_error(&e).await;
                return Err(e);
            }
        };

        let mut report = DeleteReport {
            matched: ids.len(),
            ..DeleteReport::default()
        };
        for id in ids {
            match self.backend.delete_post(&id).await {
                Ok(()) => {
                    report.deleted += 1;
                    counter!("publish_deleted_total").increment(1);
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(target: "publish", source = source_tag, post_id = %id, error = %e, "delete failed");
                    self.note_error(&e).await;
                }
            }
        }

        self.published.lock().forget_tag(source_tag);
        tracing::info!(
            target: "publish",
            source = source_tag,
            matched = report.matched,
            deleted = report.deleted,
            failed = report.failed,
            "delete-by-tag done"
        );
        Ok(report)
    }

    async fn collect_tagged(&self, source_tag: &str) -> SyncResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut page = 1u32;
        loop {
            let listing = self.backend.list_posts(page).await?;
            ids.extend(
                listing
                    .posts
                    .into_iter()
                    .filter(|p| p.tags.first().is_some_and(|t| t.name == source_tag))
                    .map(|p| p.id),
            );
            match listing.next {
                Some(n) if n > page => page = n,
                _ => break,
            }
        }
        Ok(ids)
    }

    async fn require_connected(&self, op: &'static str) -> SyncResult<()> {
        if self.is_connected().await {
            Ok(())
        } else {
            tracing::error!(target: "publish", op, "not connected, skipping");
            Err(SyncError::NotConnected)
        }
    }

    /// A rejected session makes us drop back to disconnected.
    async fn note_error(&self, e: &SyncError) {
        if matches!(e, SyncError::BackendAuth(_)) {
            *self.state.write().await = SessionState::Disconnected;
        }
    }
}

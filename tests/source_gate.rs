// tests/source_gate.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use event_sync::config::source::SourceConfig;
use event_sync::ingest::{FileBuffer, MemoryBuffer, Record, Source, SourceBuffer, UpstreamFetch};
use event_sync::{SyncError, SyncResult};

fn rec(key: &str) -> Record {
    Record {
        key: key.into(),
        occurs_at: Utc.with_ymd_and_hms(2018, 11, 20, 18, 30, 0).unwrap(),
        title: format!("{key} night"),
        summary: "An event held by SD Rust for Rustaceans".into(),
        body: String::new(),
        origin_url: None,
    }
}

/// Upstream whose answer the test controls. `None` means the call fails.
#[derive(Clone, Default)]
struct Upstream {
    answer: Arc<Mutex<Option<Vec<Record>>>>,
    calls: Arc<AtomicUsize>,
}

impl Upstream {
    /// Serve `keys` (given oldest first; upstream lists newest first).
    fn serve(&self, keys: &[&str]) {
        let mut v: Vec<Record> = keys.iter().map(|k| rec(k)).collect();
        v.reverse();
        *self.answer.lock().unwrap() = Some(v);
    }
    fn fail(&self) {
        *self.answer.lock().unwrap() = None;
    }
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamFetch for Upstream {
    async fn fetch(&self, _cfg: &SourceConfig) -> SyncResult<Vec<Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SyncError::Transport("connection reset".into()))
    }
    fn name(&self) -> &'static str {
        "test-upstream"
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 11, 15, 9, 0, 0).unwrap()
}

fn keys(rs: &[Record]) -> Vec<String> {
    rs.iter().map(|r| r.key.clone()).collect()
}

#[tokio::test]
async fn inside_interval_serves_buffer_without_calling_upstream() {
    let up = Upstream::default();
    up.serve(&["A", "B"]);
    let cfg = SourceConfig::new("Meetup", "http://upstream.test").with_min_fetch_interval(600);
    let mut src = Source::new(cfg, Box::new(up.clone()), Box::new(MemoryBuffer::new()));

    assert_eq!(keys(&src.get_all_at(t0()).await), vec!["A", "B"]);
    assert_eq!(up.calls(), 1);

    // Upstream changed, but the gate is still closed.
    up.serve(&["A", "B", "C"]);
    for secs in [1, 300, 599] {
        let got = src.get_all_at(t0() + Duration::seconds(secs)).await;
        assert_eq!(keys(&got), vec!["A", "B"]);
    }
    assert_eq!(up.calls(), 1);

    let got = src.get_all_at(t0() + Duration::seconds(600)).await;
    assert_eq!(keys(&got), vec!["A", "B", "C"]);
    assert_eq!(up.calls(), 2);
}

#[tokio::test]
async fn failed_fetch_returns_empty_and_keeps_buffer() {
    let up = Upstream::default();
    up.serve(&["A", "B"]);
    let cfg = SourceConfig::new("Meetup", "http://upstream.test").with_min_fetch_interval(60);
    let mut src = Source::new(cfg, Box::new(up.clone()), Box::new(MemoryBuffer::new()));
    src.get_all_at(t0()).await;

    up.fail();
    let t1 = t0() + Duration::seconds(60);
    assert!(src.get_all_at(t1).await.is_empty());
    assert_eq!(src.config().last_fetch_at, Some(t1), "failed attempt still stamps the gate");

    // Same gate window: buffer, which the failure did not touch.
    let got = src.get_all_at(t1 + Duration::seconds(1)).await;
    assert_eq!(keys(&got), vec!["A", "B"]);
    assert_eq!(up.calls(), 2);
}

#[tokio::test]
async fn empty_success_overwrites_buffer() {
    let up = Upstream::default();
    up.serve(&["A"]);
    let cfg = SourceConfig::new("Meetup", "http://upstream.test").with_min_fetch_interval(60);
    let mut src = Source::new(cfg, Box::new(up.clone()), Box::new(MemoryBuffer::new()));
    src.get_all_at(t0()).await;

    up.serve(&[]);
    let t1 = t0() + Duration::seconds(60);
    assert!(src.get_all_at(t1).await.is_empty());
    assert!(src.get_all_at(t1 + Duration::seconds(1)).await.is_empty());
}

#[tokio::test]
async fn duplicate_keys_in_a_batch_are_dropped() {
    let up = Upstream::default();
    up.serve(&["A", "B", "A"]);
    let cfg = SourceConfig::new("Meetup", "http://upstream.test");
    let mut src = Source::new(cfg, Box::new(up), Box::new(MemoryBuffer::new()));
    // oldest first after reversal: A, B, A → A, B
    assert_eq!(keys(&src.get_all_at(t0()).await), vec!["A", "B"]);
}

#[tokio::test]
async fn gate_and_buffer_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("meetup.json");
    let cfg = SourceConfig::new("Meetup", "http://upstream.test").with_min_fetch_interval(3600);
    std::fs::write(&cfg_path, serde_json::to_string(&cfg).unwrap()).unwrap();

    let up = Upstream::default();
    up.serve(&["A", "B"]);
    {
        let cfg = SourceConfig::load_from_file(&cfg_path).unwrap();
        let buf = FileBuffer::in_dir(dir.path(), "Meetup");
        let mut src =
            Source::new(cfg, Box::new(up.clone()), Box::new(buf)).with_config_path(&cfg_path);
        src.get_all_at(t0()).await;
    }

    // New process: gate closed from the persisted timestamp, buffer from disk.
    up.serve(&["A", "B", "C"]);
    let cfg = SourceConfig::load_from_file(&cfg_path).unwrap();
    assert_eq!(cfg.last_fetch_at, Some(t0()));
    let buf = FileBuffer::in_dir(dir.path(), "Meetup");
    assert_eq!(keys(&buf.read().await), vec!["A", "B"]);

    let mut src = Source::new(cfg, Box::new(up.clone()), Box::new(buf)).with_config_path(&cfg_path);
    let got = src.get_all_at(t0() + Duration::seconds(10)).await;
    assert_eq!(keys(&got), vec!["A", "B"]);
    assert_eq!(up.calls(), 1);
}

/// Buffer whose writes always fail.
struct BrokenBuffer;

#[async_trait]
impl SourceBuffer for BrokenBuffer {
    async fn write(&self, _records: &[Record]) -> SyncResult<()> {
        Err(SyncError::Storage(std::io::Error::other("disk full")))
    }
    async fn read(&self) -> Vec<Record> {
        Vec::new()
    }
}

#[tokio::test]
async fn buffer_write_failure_still_returns_fetch() {
    let up = Upstream::default();
    up.serve(&["A", "B"]);
    let cfg = SourceConfig::new("Meetup", "http://upstream.test");
    let mut src = Source::new(cfg, Box::new(up), Box::new(BrokenBuffer));
    assert_eq!(keys(&src.get_all_at(t0()).await), vec!["A", "B"]);
}

// src/ingest/buffer.rs
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::RwLock;

use crate::error::SyncResult;
use crate::ingest::types::Record;

/// Buffer id for a source config file: its lowercased file stem, or the whole
/// file name when there is no usable stem.
pub fn buffer_id(config_path: &Path) -> String {
    config_path
        .file_stem()
        .or_else(|| config_path.file_name())
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "source".to_string())
}

/// Last-known-good snapshot of a source's records.
#[async_trait::async_trait]
pub trait SourceBuffer: Send + Sync {
    /// Replace the stored snapshot as a whole.
    async fn write(&self, records: &[Record]) -> SyncResult<()>;
    /// Last written snapshot, or empty if nothing was ever written.
    async fn read(&self) -> Vec<Record>;
}

/// JSON file snapshot. Writes go to a sibling tmp file and are renamed into
/// place, so readers see either the old or the new snapshot.
#[derive(Debug, Clone)]
pub struct FileBuffer {
    path: PathBuf,
}

impl FileBuffer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/<id>.buffer.json`
    pub fn in_dir(dir: &Path, id: &str) -> Self {
        Self::new(dir.join(format!("{}.buffer.json", id.to_ascii_lowercase())))
    }

    /// Snapshot for the source configured at `config_path`. Keyed by the config
    /// file, not the source name, since several configs may share one name.
    pub fn for_config(dir: &Path, config_path: &Path) -> Self {
        Self::in_dir(dir, &buffer_id(config_path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl SourceBuffer for FileBuffer {
    async fn write(&self, records: &[Record]) -> SyncResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn read(&self) -> Vec<Record> {
        let data = match fs::read(&self.path).await {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(target: "ingest", path = %self.path.display(), error = %e, "cannot read buffer, treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_slice(&data) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "ingest", path = %self.path.display(), error = %e, "unreadable buffer, treating as empty");
                Vec::new()
            }
        }
    }
}

/// In-process snapshot, mostly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBuffer {
    inner: RwLock<Vec<Record>>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            inner: RwLock::new(records),
        }
    }
}

#[async_trait::async_trait]
impl SourceBuffer for MemoryBuffer {
    async fn write(&self, records: &[Record]) -> SyncResult<()> {
        *self.inner.write().await = records.to_vec();
        Ok(())
    }

    async fn read(&self) -> Vec<Record> {
        self.inner.read().await.clone()
    }
}

//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── dataset.jsonl         # Records, appended as they are pushed
//! ├── stats.json            # Summary of the last run (atomic write)
//! └── snapshots/
//!     └── {name}.html
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{CrawlSummary, JobRecord};
use crate::storage::RecordSink;

pub const DATASET_FILE: &str = "dataset.jsonl";
pub const STATS_FILE: &str = "stats.json";
const SNAPSHOT_DIR: &str = "snapshots";

/// Local filesystem storage backend.
pub struct LocalStorage {
    root_dir: PathBuf,
    /// Serializes appends to the dataset file.
    append_lock: Mutex<()>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All records in the dataset, in append order.
    pub async fn load_records(&self) -> Result<Vec<JobRecord>> {
        let Some(bytes) = self.read_bytes(DATASET_FILE).await? else {
            log::warn!("No {} found", DATASET_FILE);
            return Ok(Vec::new());
        };
        let text = String::from_utf8_lossy(&bytes);
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AppError::from))
            .collect()
    }

    pub async fn load_summary(&self) -> Result<Option<CrawlSummary>> {
        self.read_json(STATS_FILE).await
    }
}

#[async_trait]
impl RecordSink for LocalStorage {
    async fn push(&self, record: &JobRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let path = self.path(DATASET_FILE);
        let _guard = self.append_lock.lock().await;
        self.ensure_dir(&path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn snapshot(&self, name: &str, html: &str) -> Result<()> {
        let key = format!("{}/{}.html", SNAPSHOT_DIR, name);
        self.write_bytes(&key, html.as_bytes()).await?;
        log::debug!("Saved snapshot {}", key);
        Ok(())
    }

    async fn finish(&self, summary: &CrawlSummary) -> Result<()> {
        self.write_json(STATS_FILE, summary).await?;
        log::info!("Stats written to {}", self.path(STATS_FILE).display());
        Ok(())
    }
}

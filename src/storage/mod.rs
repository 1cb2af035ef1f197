//! Storage abstractions for harvested records.
//!
//! ## Directory Structure (local backend)
//!
//! ```text
//! storage/
//! ├── dataset.jsonl         # One JobRecord per line, append-only
//! ├── stats.json            # CrawlSummary of the last run
//! └── snapshots/            # Debug HTML captures
//!     └── list-20260101T120000123.html
//! ```

pub mod local;

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{CrawlSummary, JobRecord};

// Re-export for convenience
pub use local::LocalStorage;

/// Append-only destination for records. Push order need not match discovery order.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append one record.
    async fn push(&self, record: &JobRecord) -> Result<()>;

    /// Keep a copy of a page for debugging.
    async fn snapshot(&self, _name: &str, _html: &str) -> Result<()> {
        Ok(())
    }

    /// Called once when the run is over.
    async fn finish(&self, _summary: &CrawlSummary) -> Result<()> {
        Ok(())
    }
}

/// In-process sink.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<JobRecord>>,
    snapshots: Mutex<Vec<String>>,
    summary: Mutex<Option<CrawlSummary>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<JobRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Names of captured snapshots.
    pub fn snapshots(&self) -> Vec<String> {
        self.snapshots.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn summary(&self) -> Option<CrawlSummary> {
        self.summary.lock().ok().and_then(|s| s.clone())
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Sink("memory sink lock poisoned".into())
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn push(&self, record: &JobRecord) -> Result<()> {
        self.records.lock().map_err(poisoned)?.push(record.clone());
        Ok(())
    }

    async fn snapshot(&self, name: &str, _html: &str) -> Result<()> {
        self.snapshots.lock().map_err(poisoned)?.push(name.to_string());
        Ok(())
    }

    async fn finish(&self, summary: &CrawlSummary) -> Result<()> {
        *self.summary.lock().map_err(poisoned)? = Some(summary.clone());
        Ok(())
    }
}

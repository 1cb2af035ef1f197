// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod frontier;
mod job;

// Re-export all public types
pub use config::{
    BrowserIdentity, Config, Cookie, CrawlerConfig, IdentityConfig, ResolverConfig, RetryConfig,
    SanitizerConfig, SchedulePolicy, SessionConfig, SiteConfig,
};
pub use frontier::FrontierEntry;
pub use job::{JobRecord, PreviewFields};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters describing a finished crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub quota: usize,
    pub pushed: usize,
    pub pages_visited: usize,
    pub list_failures: usize,
    pub detail_failures: usize,
    pub skipped_incomplete: usize,
    pub sessions_retired: usize,
}

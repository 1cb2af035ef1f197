// src/pipeline/crawl.rs

//! Job harvesting pipeline.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{Config, CrawlSummary};
use crate::pipeline::controller::CrawlController;
use crate::services::StaticProxyProvider;
use crate::storage::RecordSink;
use crate::utils::http::HttpFetcher;
use crate::utils::log;

/// Run the harvester against live HTTP with the configured proxies.
pub async fn run_crawler(config: &Config, sink: Arc<dyn RecordSink>) -> Result<CrawlSummary> {
    log::header("Harvesting job postings");
    log::sub_item(&format!("Seeds: {}", config.crawler.seeds.len()));
    log::sub_item(&format!(
        "Quota: {}, concurrency: {}, pages per list: {}",
        config.crawler.quota, config.crawler.max_concurrent, config.crawler.max_pages_per_list
    ));
    if !config.session.proxies.is_empty() {
        log::sub_item(&format!("Proxies: {}", config.session.proxies.len()));
    }

    let fetcher = Arc::new(HttpFetcher::new()?);
    let proxies = Box::new(StaticProxyProvider::new(config.session.proxies.clone()));
    let controller = CrawlController::new(config.clone(), fetcher, proxies, sink)?;

    let summary = controller.run().await?;
    log_summary(&summary);
    Ok(summary)
}

/// Log a finished run.
pub fn log_summary(summary: &CrawlSummary) {
    let elapsed = summary.finished_at - summary.started_at;
    log::summary(
        "Crawl finished",
        &[
            ("Records", format!("{}/{}", summary.pushed, summary.quota)),
            ("Pages fetched", summary.pages_visited.to_string()),
            ("Listing failures", summary.list_failures.to_string()),
            ("Detail failures", summary.detail_failures.to_string()),
            ("Skipped (no title)", summary.skipped_incomplete.to_string()),
            ("Sessions retired", summary.sessions_retired.to_string()),
            ("Elapsed", format!("{}s", elapsed.num_seconds())),
        ],
    );
}

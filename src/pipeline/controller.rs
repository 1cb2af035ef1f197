// src/pipeline/controller.rs

//! Crawl frontier controller.
//!
//! One loop owns the frontier and dispatches work units into a bounded set of
//! concurrently polled futures. A work unit runs the fixed stage sequence
//! identity -> fetch -> block check -> extract -> sanitize -> emit and reports
//! back; only the loop touches the frontier.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use scraper::Html;

use crate::error::{AppError, Result};
use crate::models::{Config, CrawlSummary, FrontierEntry, JobRecord, PreviewFields, RetryConfig};
use crate::pipeline::state::CrawlState;
use crate::services::{
    BlockingDetector, DescriptionSanitizer, DiscoveredJob, ExtractionContext, FieldResolver,
    IdentityPool, ListingParser, NextPage, ProxyProvider, RecordAssembler, SessionOutcome,
    SessionPolicy,
};
use crate::storage::RecordSink;
use crate::utils::http::{FetchRequest, FetchResponse, Fetcher};
use crate::utils::url::page_number;

/// Result of one LIST fetch.
struct ListingOutcome {
    jobs: Vec<DiscoveredJob>,
    next: Option<NextPage>,
}

enum UnitResult {
    List {
        url: String,
        result: Result<ListingOutcome>,
    },
    /// Pushing happens in the loop, so dropping a unit never loses a counted record.
    Detail {
        url: String,
        result: Result<JobRecord>,
    },
}

/// Entries waiting for quota capacity.
#[derive(Default)]
struct Deferred {
    details: VecDeque<FrontierEntry>,
    lists: VecDeque<FrontierEntry>,
    urls: HashSet<String>,
}

impl Deferred {
    fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    fn push(&mut self, entry: FrontierEntry) {
        if self.urls.insert(entry.url().to_string()) {
            if entry.is_detail() {
                self.details.push_back(entry);
            } else {
                self.lists.push_back(entry);
            }
        }
    }
}

#[derive(Default)]
struct Tally {
    list_failures: usize,
    detail_failures: usize,
    skipped_incomplete: usize,
}

/// Drives a crawl from seeds to quota.
pub struct CrawlController {
    config: Config,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn RecordSink>,
    identity: IdentityPool,
    sessions: SessionPolicy,
    detector: BlockingDetector,
    listing: ListingParser,
    resolver: FieldResolver,
    sanitizer: DescriptionSanitizer,
    assembler: RecordAssembler,
    state: CrawlState,
    snapshot_seq: AtomicUsize,
}

impl CrawlController {
    /// Build a controller. Fails only on invalid configuration.
    pub fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        proxies: Box<dyn ProxyProvider>,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            identity: IdentityPool::new(config.identity.clone(), &config.crawler),
            sessions: SessionPolicy::new(config.session.clone(), proxies),
            detector: BlockingDetector::default(),
            listing: ListingParser::new(&config.site),
            resolver: FieldResolver::new(&config.site, &config.resolver),
            sanitizer: DescriptionSanitizer::new(&config.sanitizer)?,
            assembler: RecordAssembler::new(config.site.source.clone()),
            state: CrawlState::new(config.crawler.quota),
            snapshot_seq: AtomicUsize::new(0),
            config,
            fetcher,
            sink,
        })
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    /// Crawl until the quota is met or the frontier is exhausted.
    pub async fn run(&self) -> Result<CrawlSummary> {
        let started_at = Utc::now();
        let mut frontier: VecDeque<FrontierEntry> = VecDeque::new();
        let mut deferred = Deferred::default();
        let mut tally = Tally::default();

        for seed in &self.config.crawler.seeds {
            if self.state.mark_visited(seed) {
                frontier.push_back(FrontierEntry::List {
                    url: seed.clone(),
                    page_index: page_number(seed).unwrap_or(1),
                    referer: self.config.site.default_referer.clone(),
                });
            }
        }

        let concurrency = self.config.crawler.max_concurrent.max(1);
        let mut running = FuturesUnordered::new();

        loop {
            if !self.state.is_cancelled() {
                self.resume_deferred(&mut frontier, &mut deferred, running.is_empty());
                while running.len() < concurrency {
                    let Some(entry) = frontier.pop_front() else {
                        break;
                    };
                    log::debug!("Dispatching {} {}", entry.kind(), entry.url());
                    running.push(self.process(entry));
                }
            }

            let Some(unit) = running.next().await else {
                break;
            };
            self.handle(unit, &mut frontier, &mut deferred, &mut tally).await;

            if self.state.is_cancelled() {
                log::info!(
                    "Quota of {} reached; abandoning {} in-flight and {} queued entries",
                    self.state.quota(),
                    running.len(),
                    frontier.len()
                );
                break;
            }
        }
        drop(running);

        let summary = CrawlSummary {
            started_at,
            finished_at: Utc::now(),
            quota: self.state.quota(),
            pushed: self.state.pushed(),
            pages_visited: self.state.pages_fetched(),
            list_failures: tally.list_failures,
            detail_failures: tally.detail_failures,
            skipped_incomplete: tally.skipped_incomplete,
            sessions_retired: self.sessions.retired_count(),
        };
        self.sink.finish(&summary).await?;
        Ok(summary)
    }

    /// Move deferred entries back into the frontier once there is room.
    fn resume_deferred(
        &self,
        frontier: &mut VecDeque<FrontierEntry>,
        deferred: &mut Deferred,
        drained: bool,
    ) {
        while !deferred.details.is_empty() && self.state.try_reserve_detail() {
            let Some(entry) = deferred.details.pop_front() else {
                self.state.release_detail();
                break;
            };
            deferred.urls.remove(entry.url());
            if self.state.mark_visited(entry.url()) {
                frontier.push_back(entry);
            } else {
                self.state.release_detail();
            }
        }

        // Listing pages wait until every outstanding detail has settled.
        if drained && frontier.is_empty() && !self.state.quota_reached() {
            while let Some(entry) = deferred.lists.pop_front() {
                deferred.urls.remove(entry.url());
                if self.state.mark_visited(entry.url()) {
                    log::info!("Resuming deferred listing page {}", entry.url());
                    frontier.push_back(entry);
                }
            }
        }
    }

    async fn handle(
        &self,
        unit: UnitResult,
        frontier: &mut VecDeque<FrontierEntry>,
        deferred: &mut Deferred,
        tally: &mut Tally,
    ) {
        match unit {
            UnitResult::List { url, result } => match result {
                Ok(outcome) => self.enqueue_discoveries(&url, outcome, frontier, deferred),
                Err(e) => {
                    tally.list_failures += 1;
                    log::warn!("Listing page {} failed permanently: {}", url, e);
                }
            },
            UnitResult::Detail { url, result } => {
                match result {
                    Ok(record) => self.emit(record, tally).await,
                    Err(AppError::ExtractionIncomplete { .. }) => {
                        tally.skipped_incomplete += 1;
                        log::warn!("Skipping {}: no title resolved", url);
                    }
                    Err(e) => {
                        tally.detail_failures += 1;
                        log::warn!("Detail page {} failed permanently: {}", url, e);
                    }
                }
                self.state.release_detail();
            }
        }
    }

    /// Claim a push slot and hand the record to the sink.
    async fn emit(&self, record: JobRecord, tally: &mut Tally) {
        if !self.state.try_push() {
            log::debug!("Discarded {}: quota already filled", record.url);
            return;
        }
        if let Err(e) = self.sink.push(&record).await {
            self.state.rollback_push();
            tally.detail_failures += 1;
            log::warn!("Sink rejected {}: {}", record.url, e);
            return;
        }
        log::info!(
            "[{}/{}] {} ({})",
            self.state.pushed(),
            self.state.quota(),
            record.title,
            record.company.as_deref().unwrap_or("unknown company")
        );
    }

    fn enqueue_discoveries(
        &self,
        list_url: &str,
        outcome: ListingOutcome,
        frontier: &mut VecDeque<FrontierEntry>,
        deferred: &mut Deferred,
    ) {
        let found = outcome.jobs.len();
        let mut enqueued = 0;

        for job in outcome.jobs {
            if self.state.quota_reached() {
                break;
            }
            if self.state.is_visited(&job.url) || deferred.contains(&job.url) {
                continue;
            }
            let entry = FrontierEntry::Detail {
                url: job.url,
                referer: list_url.to_string(),
                preview: (!job.preview.is_empty()).then_some(job.preview),
            };
            if !self.state.try_reserve_detail() {
                deferred.push(entry);
                continue;
            }
            if self.state.mark_visited(entry.url()) {
                frontier.push_back(entry);
                enqueued += 1;
            } else {
                self.state.release_detail();
            }
        }

        log::info!(
            "{}: {} job link(s), {} enqueued (pushed {}, in flight {})",
            list_url,
            found,
            enqueued,
            self.state.pushed(),
            self.state.in_flight()
        );

        let Some(next) = outcome.next else {
            return;
        };
        if self.state.quota_reached() || self.state.is_visited(&next.url) {
            return;
        }
        log::debug!("Next listing page {} via {:?}", next.url, next.via);
        let entry = FrontierEntry::List {
            url: next.url,
            page_index: next.page_index,
            referer: list_url.to_string(),
        };
        if !self.state.has_detail_capacity() {
            deferred.push(entry);
        } else if self.state.mark_visited(entry.url()) {
            frontier.push_back(entry);
        }
    }

    /// One work unit.
    async fn process(&self, entry: FrontierEntry) -> UnitResult {
        match entry {
            FrontierEntry::List {
                url,
                page_index,
                referer,
            } => {
                let result = self.process_list(&url, page_index, &referer).await;
                UnitResult::List { url, result }
            }
            FrontierEntry::Detail {
                url,
                referer,
                preview,
            } => {
                let result = self.process_detail(&url, &referer, preview).await;
                UnitResult::Detail { url, result }
            }
        }
    }

    async fn process_list(&self, url: &str, page_index: u32, referer: &str) -> Result<ListingOutcome> {
        let response = self.fetch_with_retry(url, referer).await?;

        let outcome = {
            let document = Html::parse_document(&response.body);
            ListingOutcome {
                jobs: self.listing.discover_jobs(&document, url),
                next: self.listing.next_page(
                    &document,
                    url,
                    page_index,
                    self.config.crawler.max_pages_per_list,
                ),
            }
        };

        if outcome.jobs.is_empty() {
            log::warn!("No job links found on {}", url);
            self.snapshot("list", &response.body).await;
        }
        Ok(outcome)
    }

    async fn process_detail(
        &self,
        url: &str,
        referer: &str,
        preview: Option<PreviewFields>,
    ) -> Result<JobRecord> {
        let response = self.fetch_with_retry(url, referer).await?;

        let (record, incomplete) = self.extract(url, &response.body, preview.as_ref());
        if incomplete {
            self.snapshot("detail", &response.body).await;
        }
        record
    }

    /// Resolve, sanitize and assemble. Also reports whether title or description is missing.
    fn extract(
        &self,
        url: &str,
        body: &str,
        preview: Option<&PreviewFields>,
    ) -> (Result<JobRecord>, bool) {
        let document = Html::parse_document(body);
        let ctx = ExtractionContext::new(url, &document, preview);
        let fields = self.resolver.resolve(&ctx);
        let description = self.sanitizer.clean(&fields.description_candidates);

        if fields.title.is_none() && self.is_auth_wall(&document) {
            log::warn!("{} looks like a sign-in wall", url);
        }
        let incomplete = fields.title.is_none() || description.html.is_none();
        (self.assembler.assemble(url, fields, description), incomplete)
    }

    fn is_auth_wall(&self, document: &Html) -> bool {
        let text = document.root_element().text().collect::<String>().to_lowercase();
        self.config
            .site
            .auth_wall_phrases
            .iter()
            .any(|phrase| text.contains(&phrase.to_lowercase()))
    }

    async fn snapshot(&self, kind: &str, html: &str) {
        if !self.config.crawler.debug {
            return;
        }
        let seq = self.snapshot_seq.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{}-{}", kind, Utc::now().format("%Y%m%dT%H%M%S%3f"), seq);
        if let Err(e) = self.sink.snapshot(&name, html).await {
            log::warn!("Failed to save snapshot {}: {}", name, e);
        }
    }

    /// Retry blocked and network failures with exponential backoff plus jitter.
    async fn fetch_with_retry(&self, url: &str, referer: &str) -> Result<FetchResponse> {
        let max_retries = self.config.retry.max_retries;
        let mut attempt = 0;
        loop {
            match self.fetch_once(url, referer).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < max_retries && !self.state.is_cancelled() => {
                    let delay = backoff_delay(&self.config.retry, attempt);
                    log::warn!(
                        "Attempt {}/{} for {} failed: {}. Retrying in {:?}",
                        attempt + 1,
                        max_retries + 1,
                        url,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt under a fresh identity and a pooled session.
    async fn fetch_once(&self, url: &str, referer: &str) -> Result<FetchResponse> {
        let session = self.sessions.acquire();
        let identity = self.identity.draw();
        let timeout = Duration::from_secs(self.config.crawler.timeout_secs);
        let request = FetchRequest {
            url: url.to_string(),
            headers: self.identity.headers(&identity, url, referer),
            proxy: session.egress.clone(),
            timeout,
        };

        tokio::time::sleep(self.identity.pre_fetch_delay()).await;

        let response = match tokio::time::timeout(timeout, self.fetcher.fetch(&request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.sessions.release(session, SessionOutcome::Failed);
                return Err(e);
            }
            Err(_) => {
                self.sessions.release(session, SessionOutcome::Failed);
                return Err(AppError::network(url, format!("timed out after {:?}", timeout)));
            }
        };

        let verdict = {
            let document = Html::parse_document(&response.body);
            self.detector.classify(&response, &document)
        };
        if let Err(e) = verdict.into_result(url) {
            let session_id = session.id;
            self.sessions.release(session, SessionOutcome::Blocked);
            log::warn!("Session #{} retired: {}", session_id, e);
            return Err(e);
        }

        if response.status >= 500 {
            self.sessions.release(session, SessionOutcome::Failed);
            return Err(AppError::network(url, format!("server error {}", response.status)));
        }
        self.sessions.release(session, SessionOutcome::Good);
        if response.status >= 400 {
            return Err(AppError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        self.state.record_page();
        tokio::time::sleep(self.identity.reading_delay(response.body.len())).await;
        Ok(response)
    }
}

/// `base * 2^attempt + jitter`, capped.
fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exponential = retry
        .base_backoff_ms
        .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
    let jitter = if retry.max_jitter_ms > 0 {
        rand::rng().random_range(0..=retry.max_jitter_ms)
    } else {
        0
    };
    Duration::from_millis(exponential.saturating_add(jitter).min(retry.max_backoff_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::StaticProxyProvider;
    use crate::storage::MemorySink;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted responses per URL; the last one repeats.
    #[derive(Default)]
    struct MockFetcher {
        pages: Mutex<HashMap<String, VecDeque<(u16, String)>>>,
        delays: Mutex<HashMap<String, Duration>>,
        requests: Mutex<Vec<FetchRequest>>,
    }

    impl MockFetcher {
        fn page(self, url: &str, status: u16, body: impl Into<String>) -> Self {
            self.pages
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back((status, body.into()));
            self
        }

        fn slow(self, url: &str, delay: Duration) -> Self {
            self.delays.lock().unwrap().insert(url.to_string(), delay);
            self
        }

        fn requests_for(&self, url: &str) -> Vec<FetchRequest> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.url == url)
                .cloned()
                .collect()
        }

        fn fetched_urls(&self) -> Vec<String> {
            self.requests.lock().unwrap().iter().map(|r| r.url.clone()).collect()
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let delay = self.delays.lock().unwrap().get(&request.url).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let mut pages = self.pages.lock().unwrap();
            let (status, body) = match pages.get_mut(&request.url) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => queue.front().cloned().unwrap(),
                None => (404, "<html><body>Not found</body></html>".to_string()),
            };
            Ok(FetchResponse {
                url: request.url.clone(),
                status,
                body,
            })
        }
    }

    /// Delays the push of one URL so other units finish first.
    struct SlowSink {
        inner: MemorySink,
        slow_url: String,
    }

    #[async_trait]
    impl RecordSink for SlowSink {
        async fn push(&self, record: &JobRecord) -> Result<()> {
            if record.url == self.slow_url {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            self.inner.push(record).await
        }

        async fn finish(&self, summary: &CrawlSummary) -> Result<()> {
            self.inner.finish(summary).await
        }
    }

    const LIST_URL: &str = "https://jobs.test/remote";

    fn config(quota: usize) -> Config {
        let mut config = Config::default();
        config.crawler.seeds = vec![LIST_URL.to_string()];
        config.crawler.quota = quota;
        config.crawler.max_concurrent = 3;
        config.crawler.max_pages_per_list = 1;
        config.identity = config.identity.clone().without_delays();
        config.retry.base_backoff_ms = 0;
        config.retry.max_jitter_ms = 0;
        config.retry.max_retries = 2;
        config.site.allowed_hosts = vec!["jobs.test".to_string()];
        config.site.detail_url_patterns = vec!["/job/".to_string()];
        config.site.detail_link_selectors = vec![r#"a[href*="/job/"]"#.to_string()];
        config
    }

    fn listing(ids: &[usize]) -> String {
        let links: String = ids
            .iter()
            .map(|i| format!(r#"<li><a href="/job/{i}">Job {i}</a><a href="/job/{i}">again</a></li>"#))
            .collect();
        format!("<html><body><ul>{links}</ul></body></html>")
    }

    fn detail(i: usize) -> String {
        format!(
            r#"<html><body><main><h1>Engineer {i}</h1>
            <div><ul><li><h5>Company:</h5><p>Acme {i}</p></li></ul></div>
            <div><p>Design, build and run the services that power remote hiring for thousands of people.</p></div>
            </main></body></html>"#
        )
    }

    fn detail_url(i: usize) -> String {
        format!("https://jobs.test/job/{i}")
    }

    fn fetcher_with_jobs(ids: &[usize]) -> MockFetcher {
        ids.iter().fold(
            MockFetcher::default().page(LIST_URL, 200, listing(ids)),
            |fetcher, &i| fetcher.page(&detail_url(i), 200, detail(i)),
        )
    }

    fn controller(config: Config, fetcher: Arc<MockFetcher>, sink: Arc<MemorySink>) -> CrawlController {
        CrawlController::new(
            config,
            fetcher,
            Box::new(StaticProxyProvider::default()),
            sink,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn crawls_each_detail_once() {
        let ids: Vec<usize> = (1..=5).collect();
        let fetcher = Arc::new(fetcher_with_jobs(&ids));
        let sink = Arc::new(MemorySink::new());
        let summary = controller(config(100), fetcher.clone(), sink.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(summary.pushed, 5);
        assert_eq!(sink.records().len(), 5);
        let fetched = fetcher.fetched_urls();
        let distinct: HashSet<_> = fetched.iter().collect();
        assert_eq!(distinct.len(), fetched.len());

        let record = sink
            .records()
            .into_iter()
            .find(|r| r.url == detail_url(3))
            .unwrap();
        assert_eq!(record.title, "Engineer 3");
        assert_eq!(record.company.as_deref(), Some("Acme 3"));
        assert!(record.description_text.unwrap().starts_with("Design, build"));
        assert_eq!(sink.summary().unwrap().pushed, 5);
    }

    #[tokio::test]
    async fn detail_requests_carry_list_referer() {
        let fetcher = Arc::new(fetcher_with_jobs(&[1]));
        let sink = Arc::new(MemorySink::new());
        controller(config(10), fetcher.clone(), sink).run().await.unwrap();

        let seed = &fetcher.requests_for(LIST_URL)[0];
        assert_eq!(seed.header("Referer"), Some("https://www.google.com/"));
        let detail = &fetcher.requests_for(&detail_url(1))[0];
        assert_eq!(detail.header("Referer"), Some(LIST_URL));
    }

    #[tokio::test]
    async fn stops_at_quota() {
        let ids: Vec<usize> = (1..=30).collect();
        let fetcher = Arc::new(fetcher_with_jobs(&ids));
        let sink = Arc::new(MemorySink::new());
        let mut config = config(10);
        config.crawler.max_pages_per_list = 5;
        let ctl = controller(config, fetcher.clone(), sink.clone());
        let summary = ctl.run().await.unwrap();

        assert_eq!(summary.pushed, 10);
        assert_eq!(sink.records().len(), 10);
        assert!(ctl.state().is_cancelled());
        // Never more than the quota worth of details scheduled, no second listing page.
        let details = fetcher.fetched_urls().iter().filter(|u| u.contains("/job/")).count();
        assert_eq!(details, 10);
        assert!(fetcher.requests_for("https://jobs.test/remote?page=2").is_empty());
    }

    #[tokio::test]
    async fn blocked_detail_retries_with_new_session() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .page(LIST_URL, 200, listing(&[1]))
                .page(&detail_url(1), 403, "<html><body>Forbidden</body></html>")
                .page(&detail_url(1), 200, detail(1)),
        );
        let sink = Arc::new(MemorySink::new());
        let ctl = controller(config(10), fetcher.clone(), sink.clone());
        let summary = ctl.run().await.unwrap();

        assert_eq!(fetcher.requests_for(&detail_url(1)).len(), 2);
        assert_eq!(summary.sessions_retired, 1);
        assert_eq!(sink.records().len(), 1);
        assert_eq!(summary.detail_failures, 0);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_only_that_url() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .page(LIST_URL, 200, listing(&[1, 2]))
                .page(&detail_url(1), 429, "<html><body>slow down</body></html>")
                .page(&detail_url(2), 200, detail(2)),
        );
        let sink = Arc::new(MemorySink::new());
        let summary = controller(config(10), fetcher.clone(), sink.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(fetcher.requests_for(&detail_url(1)).len(), 3);
        assert_eq!(summary.detail_failures, 1);
        assert_eq!(summary.pushed, 1);
        assert_eq!(sink.records()[0].url, detail_url(2));
    }

    #[tokio::test]
    async fn challenge_page_is_blocked() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .page(LIST_URL, 200, listing(&[1]))
                .page(
                    &detail_url(1),
                    200,
                    "<html><head><title>Just a moment...</title></head><body></body></html>",
                )
                .page(&detail_url(1), 200, detail(1)),
        );
        let sink = Arc::new(MemorySink::new());
        let summary = controller(config(10), fetcher.clone(), sink.clone())
            .run()
            .await
            .unwrap();
        assert_eq!(summary.sessions_retired, 1);
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn missing_title_is_skipped_without_retry() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .page(
                    LIST_URL,
                    200,
                    r#"<html><body><ul><li><a href="/job/1"></a></li></ul></body></html>"#,
                )
                .page(
                    &detail_url(1),
                    200,
                    "<html><body><p>Please log in to continue.</p></body></html>",
                ),
        );
        let sink = Arc::new(MemorySink::new());
        let mut config = config(10);
        config.crawler.debug = true;
        let summary = controller(config, fetcher.clone(), sink.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(fetcher.requests_for(&detail_url(1)).len(), 1);
        assert_eq!(summary.skipped_incomplete, 1);
        assert!(sink.records().is_empty());
        assert!(sink.snapshots().iter().any(|s| s.starts_with("detail-")));
    }

    #[tokio::test]
    async fn synthetic_pagination_respects_page_limit() {
        let page3 = "https://jobs.test/remote?page=3";
        let page4 = "https://jobs.test/remote?page=4";
        let page5 = "https://jobs.test/remote?page=5";
        let page6 = "https://jobs.test/remote?page=6";
        let fetcher = Arc::new(
            MockFetcher::default()
                .page(page3, 200, listing(&[3]))
                .page(page4, 200, listing(&[4]))
                .page(page5, 200, listing(&[5]))
                .page(&detail_url(3), 200, detail(3))
                .page(&detail_url(4), 200, detail(4))
                .page(&detail_url(5), 200, detail(5)),
        );
        let sink = Arc::new(MemorySink::new());
        let mut config = config(100);
        config.crawler.seeds = vec![page3.to_string()];
        config.crawler.max_pages_per_list = 5;
        let summary = controller(config, fetcher.clone(), sink.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(fetcher.requests_for(page4).len(), 1);
        assert_eq!(fetcher.requests_for(page5).len(), 1);
        assert!(fetcher.requests_for(page6).is_empty());
        assert_eq!(summary.pushed, 3);
    }

    #[tokio::test]
    async fn every_counted_record_reaches_the_sink() {
        let fetcher = Arc::new(fetcher_with_jobs(&[1, 2]));
        let sink = Arc::new(SlowSink {
            inner: MemorySink::new(),
            slow_url: detail_url(1),
        });
        let summary = CrawlController::new(
            config(2),
            fetcher,
            Box::new(StaticProxyProvider::default()),
            sink.clone(),
        )
        .unwrap()
        .run()
        .await
        .unwrap();

        assert_eq!(summary.pushed, 2);
        assert_eq!(sink.inner.records().len(), 2);
        assert_eq!(sink.inner.summary().unwrap().pushed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_detail_is_retried_then_fails_alone() {
        let fetcher = Arc::new(
            fetcher_with_jobs(&[1, 2]).slow(&detail_url(1), Duration::from_secs(60)),
        );
        let sink = Arc::new(MemorySink::new());
        let mut config = config(10);
        config.crawler.timeout_secs = 1;
        let summary = controller(config, fetcher.clone(), sink.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(fetcher.requests_for(&detail_url(1)).len(), 3);
        assert_eq!(summary.detail_failures, 1);
        assert_eq!(summary.pushed, 1);
        assert_eq!(sink.records()[0].url, detail_url(2));
    }

    #[tokio::test]
    async fn deferred_listing_resumes_after_details_fail() {
        let page2 = "https://jobs.test/remote?page=2";
        // Details 1 and 2 are unscripted and answer 404.
        let fetcher = Arc::new(
            MockFetcher::default()
                .page(LIST_URL, 200, listing(&[1, 2]))
                .page(page2, 200, listing(&[3, 4]))
                .page(&detail_url(3), 200, detail(3))
                .page(&detail_url(4), 200, detail(4)),
        );
        let sink = Arc::new(MemorySink::new());
        let mut config = config(2);
        config.crawler.max_pages_per_list = 2;
        let summary = controller(config, fetcher.clone(), sink.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(fetcher.requests_for(page2).len(), 1);
        assert_eq!(summary.detail_failures, 2);
        assert_eq!(summary.pushed, 2);
        let mut urls: Vec<_> = sink.records().into_iter().map(|r| r.url).collect();
        urls.sort();
        assert_eq!(urls, vec![detail_url(3), detail_url(4)]);
    }

    #[tokio::test]
    async fn rejects_empty_seed_list() {
        let mut config = config(10);
        config.crawler.seeds.clear();
        let result = CrawlController::new(
            config,
            Arc::new(MockFetcher::default()),
            Box::new(StaticProxyProvider::default()),
            Arc::new(MemorySink::new()),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let retry = RetryConfig {
            max_retries: 6,
            base_backoff_ms: 100,
            max_jitter_ms: 0,
            max_backoff_ms: 1000,
        };
        assert_eq!(backoff_delay(&retry, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(&retry, 2), Duration::from_millis(400));
        assert_eq!(backoff_delay(&retry, 10), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&retry, 70), Duration::from_millis(1000));
    }
}

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Seeds, quota and worker pool settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Retry and backoff policy for blocked or failed requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Browser identity pools and request pacing
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Session rotation limits and egress proxies
    #[serde(default)]
    pub session: SessionConfig,

    /// Site-specific link shapes and vocabulary
    #[serde(default)]
    pub site: SiteConfig,

    /// Description cleaning rules
    #[serde(default)]
    pub sanitizer: SanitizerConfig,

    /// Field precedence policies
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values. Failing here is the only fatal error of a run.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.seeds.is_empty() {
            return Err(AppError::config("crawler.seeds is empty"));
        }
        for seed in &self.crawler.seeds {
            url::Url::parse(seed)
                .map_err(|e| AppError::config(format!("invalid seed URL '{seed}': {e}")))?;
        }
        if self.crawler.quota == 0 {
            return Err(AppError::validation("crawler.quota must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.crawler.max_pages_per_list == 0 {
            return Err(AppError::validation(
                "crawler.max_pages_per_list must be > 0",
            ));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.identity.browsers.is_empty() {
            return Err(AppError::validation("identity.browsers is empty"));
        }
        if self.identity.browsers.iter().any(|b| b.user_agent.trim().is_empty()) {
            return Err(AppError::validation("identity.browsers has an empty user_agent"));
        }
        if self.identity.accept_languages.is_empty() {
            return Err(AppError::validation("identity.accept_languages is empty"));
        }
        if self.identity.pre_fetch_delay_min_ms > self.identity.pre_fetch_delay_max_ms {
            return Err(AppError::validation(
                "identity.pre_fetch_delay_min_ms exceeds pre_fetch_delay_max_ms",
            ));
        }
        if self.session.pool_size == 0 {
            return Err(AppError::validation("session.pool_size must be > 0"));
        }
        if self.session.max_usage == 0 {
            return Err(AppError::validation("session.max_usage must be > 0"));
        }
        if self.site.detail_link_selectors.is_empty() {
            return Err(AppError::validation("site.detail_link_selectors is empty"));
        }
        Ok(())
    }
}

/// Seeds, quota and worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Listing pages the crawl starts from
    #[serde(default = "defaults::seeds")]
    pub seeds: Vec<String>,

    /// Maximum number of job records to emit
    #[serde(default = "defaults::quota")]
    pub quota: usize,

    /// Concurrency ceiling of the worker pool
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum number of pages followed per listing
    #[serde(default = "defaults::max_pages_per_list")]
    pub max_pages_per_list: u32,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Save HTML snapshots of pages that yield nothing
    #[serde(default)]
    pub debug: bool,

    /// Cookies attached verbatim to every request
    #[serde(default)]
    pub cookies: Vec<Cookie>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seeds: defaults::seeds(),
            quota: defaults::quota(),
            max_concurrent: defaults::max_concurrent(),
            max_pages_per_list: defaults::max_pages_per_list(),
            timeout_secs: defaults::timeout(),
            debug: false,
            cookies: Vec::new(),
        }
    }
}

impl CrawlerConfig {
    /// Render the cookie set as a `Cookie` header value.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// A single externally supplied cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Retry and backoff policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt for blocked/network failures
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base delay doubled on every attempt
    #[serde(default = "defaults::base_backoff")]
    pub base_backoff_ms: u64,

    /// Upper bound of the random jitter added to each backoff
    #[serde(default = "defaults::max_jitter")]
    pub max_jitter_ms: u64,

    /// Cap on a single backoff delay
    #[serde(default = "defaults::max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            base_backoff_ms: defaults::base_backoff(),
            max_jitter_ms: defaults::max_jitter(),
            max_backoff_ms: defaults::max_backoff(),
        }
    }
}

/// A consistent browser fingerprint: user agent plus matching client hints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrowserIdentity {
    pub user_agent: String,

    /// `Sec-CH-UA` value; absent for browsers that do not send client hints
    #[serde(default)]
    pub sec_ch_ua: Option<String>,

    #[serde(default)]
    pub sec_ch_ua_platform: Option<String>,

    #[serde(default)]
    pub sec_ch_ua_mobile: Option<String>,
}

/// Identity pools and request pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "defaults::browsers")]
    pub browsers: Vec<BrowserIdentity>,

    #[serde(default = "defaults::accept_languages")]
    pub accept_languages: Vec<String>,

    /// Jittered delay before every fetch
    #[serde(default = "defaults::pre_fetch_min")]
    pub pre_fetch_delay_min_ms: u64,

    #[serde(default = "defaults::pre_fetch_max")]
    pub pre_fetch_delay_max_ms: u64,

    /// Minimum "reading" delay after a fetch
    #[serde(default = "defaults::reading_min")]
    pub reading_delay_min_ms: u64,

    /// Upper bound of the reading delay
    #[serde(default = "defaults::reading_max")]
    pub reading_delay_max_ms: u64,

    /// Response bytes "read" per millisecond of delay
    #[serde(default = "defaults::reading_bytes_per_ms")]
    pub reading_bytes_per_ms: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            browsers: defaults::browsers(),
            accept_languages: defaults::accept_languages(),
            pre_fetch_delay_min_ms: defaults::pre_fetch_min(),
            pre_fetch_delay_max_ms: defaults::pre_fetch_max(),
            reading_delay_min_ms: defaults::reading_min(),
            reading_delay_max_ms: defaults::reading_max(),
            reading_bytes_per_ms: defaults::reading_bytes_per_ms(),
        }
    }
}

impl IdentityConfig {
    /// Identity settings with every delay disabled.
    pub fn without_delays(mut self) -> Self {
        self.pre_fetch_delay_min_ms = 0;
        self.pre_fetch_delay_max_ms = 0;
        self.reading_delay_min_ms = 0;
        self.reading_delay_max_ms = 0;
        self
    }
}

/// Session rotation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of idle sessions kept for reuse
    #[serde(default = "defaults::pool_size")]
    pub pool_size: usize,

    /// Requests served before a session is retired
    #[serde(default = "defaults::max_usage")]
    pub max_usage: u32,

    /// Error score at which a session is retired
    #[serde(default = "defaults::max_error_score")]
    pub max_error_score: f64,

    /// Egress proxy URLs assigned round-robin to new sessions
    #[serde(default)]
    pub proxies: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pool_size: defaults::pool_size(),
            max_usage: defaults::max_usage(),
            max_error_score: defaults::max_error_score(),
            proxies: Vec::new(),
        }
    }
}

/// Site-specific link shapes and vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Value of the `source` field on every record
    #[serde(default = "defaults::source")]
    pub source: String,

    /// Hosts whose links count as detail pages
    #[serde(default = "defaults::allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// Selectors (ranked) for anchors pointing to detail pages
    #[serde(default = "defaults::detail_link_selectors")]
    pub detail_link_selectors: Vec<String>,

    /// URL substrings identifying a detail page
    #[serde(default = "defaults::detail_url_patterns")]
    pub detail_url_patterns: Vec<String>,

    /// Referer sent with seed requests
    #[serde(default = "defaults::default_referer")]
    pub default_referer: String,

    /// The site's own brand names, never a valid company
    #[serde(default = "defaults::brand_names")]
    pub brand_names: Vec<String>,

    /// Placeholder text shown instead of hidden company names
    #[serde(default = "defaults::masked_company_phrases")]
    pub masked_company_phrases: Vec<String>,

    /// Phrases marking a login/membership wall
    #[serde(default = "defaults::auth_wall_phrases")]
    pub auth_wall_phrases: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source: defaults::source(),
            allowed_hosts: defaults::allowed_hosts(),
            detail_link_selectors: defaults::detail_link_selectors(),
            detail_url_patterns: defaults::detail_url_patterns(),
            default_referer: defaults::default_referer(),
            brand_names: defaults::brand_names(),
            masked_company_phrases: defaults::masked_company_phrases(),
            auth_wall_phrases: defaults::auth_wall_phrases(),
        }
    }
}

/// Description cleaning rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizerConfig {
    /// Minimum text length of an acceptable description
    #[serde(default = "defaults::min_description_chars")]
    pub min_description_chars: usize,

    /// Marketing strings removed from descriptions
    #[serde(default = "defaults::boilerplate_phrases")]
    pub boilerplate_phrases: Vec<String>,

    /// Class-name fragments of promotional containers
    #[serde(default = "defaults::promo_class_patterns")]
    pub promo_class_patterns: Vec<String>,

    /// Heading text fragments that open a promotional block
    #[serde(default = "defaults::promo_heading_patterns")]
    pub promo_heading_patterns: Vec<String>,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            min_description_chars: defaults::min_description_chars(),
            boilerplate_phrases: defaults::boilerplate_phrases(),
            promo_class_patterns: defaults::promo_class_patterns(),
            promo_heading_patterns: defaults::promo_heading_patterns(),
        }
    }
}

/// How `schedule` may borrow from the structured employment type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePolicy {
    /// Use the employment type only when `job_type` came from its own label.
    #[default]
    EmploymentTypeFallback,
    /// Only the "job schedule" label may set `schedule`.
    LabelOnly,
}

/// Field precedence policies.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolverConfig {
    #[serde(default)]
    pub schedule_policy: SchedulePolicy,
}

mod defaults {
    use super::BrowserIdentity;

    // Crawler defaults
    pub fn seeds() -> Vec<String> {
        vec![
            "https://www.flexjobs.com/remote-jobs".into(),
            "https://www.flexjobs.com/remote-jobs/legitimate-work-from-home-jobs-hiring-now".into(),
        ]
    }
    pub fn quota() -> usize {
        100
    }
    pub fn max_concurrent() -> usize {
        6
    }
    pub fn max_pages_per_list() -> u32 {
        20
    }
    pub fn timeout() -> u64 {
        30
    }

    // Retry defaults
    pub fn max_retries() -> u32 {
        6
    }
    pub fn base_backoff() -> u64 {
        1000
    }
    pub fn max_jitter() -> u64 {
        500
    }
    pub fn max_backoff() -> u64 {
        30_000
    }

    // Identity defaults
    pub fn browsers() -> Vec<BrowserIdentity> {
        vec![
            BrowserIdentity {
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0 Safari/537.36".into(),
                sec_ch_ua: Some(r#""Chromium";v="123", "Google Chrome";v="123", "Not;A=Brand";v="99""#.into()),
                sec_ch_ua_platform: Some(r#""Windows""#.into()),
                sec_ch_ua_mobile: Some("?0".into()),
            },
            BrowserIdentity {
                user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0 Safari/537.36".into(),
                sec_ch_ua: Some(r#""Not.A/Brand";v="8", "Chromium";v="122", "Google Chrome";v="122""#.into()),
                sec_ch_ua_platform: Some(r#""Linux""#.into()),
                sec_ch_ua_mobile: Some("?0".into()),
            },
            BrowserIdentity {
                user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15".into(),
                sec_ch_ua: None,
                sec_ch_ua_platform: None,
                sec_ch_ua_mobile: None,
            },
            BrowserIdentity {
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; rv:123.0) Gecko/20100101 Firefox/123.0".into(),
                sec_ch_ua: None,
                sec_ch_ua_platform: None,
                sec_ch_ua_mobile: None,
            },
        ]
    }
    pub fn accept_languages() -> Vec<String> {
        vec![
            "en-US,en;q=0.9".into(),
            "en-GB,en;q=0.9".into(),
            "en;q=0.8".into(),
        ]
    }
    pub fn pre_fetch_min() -> u64 {
        400
    }
    pub fn pre_fetch_max() -> u64 {
        1800
    }
    pub fn reading_min() -> u64 {
        200
    }
    pub fn reading_max() -> u64 {
        2000
    }
    pub fn reading_bytes_per_ms() -> u64 {
        100
    }

    // Session defaults
    pub fn pool_size() -> usize {
        20
    }
    pub fn max_usage() -> u32 {
        50
    }
    pub fn max_error_score() -> f64 {
        3.0
    }

    // Site defaults
    pub fn source() -> String {
        "flexjobs".into()
    }
    pub fn allowed_hosts() -> Vec<String> {
        vec!["flexjobs.com".into()]
    }
    pub fn detail_link_selectors() -> Vec<String> {
        vec![
            r#"a[href*="/publicjobs/"]"#.into(),
            r#"a[href*="/remote-jobs/"][href*="-job-"]"#.into(),
            r#"a[href*="/job/"]"#.into(),
            "a.job-link".into(),
            r#"a[class*="job-title"]"#.into(),
            "[data-job-url]".into(),
        ]
    }
    pub fn detail_url_patterns() -> Vec<String> {
        vec!["/publicjobs/".into(), "-job-".into(), "/job/".into()]
    }
    pub fn default_referer() -> String {
        "https://www.google.com/".into()
    }
    pub fn brand_names() -> Vec<String> {
        vec!["flexjobs".into(), "flex jobs".into(), "flexjobs.com".into()]
    }
    pub fn masked_company_phrases() -> Vec<String> {
        vec![
            "details hidden".into(),
            "details here".into(),
            "company hidden".into(),
            "unlock company".into(),
            "unlock to view".into(),
        ]
    }
    pub fn auth_wall_phrases() -> Vec<String> {
        vec![
            "log in".into(),
            "sign in".into(),
            "become a member".into(),
            "join flexjobs".into(),
        ]
    }

    // Sanitizer defaults
    pub fn min_description_chars() -> usize {
        60
    }
    pub fn boilerplate_phrases() -> Vec<String> {
        vec![
            "Find Your Next Remote Job!".into(),
            "Find Your Next Remote Job".into(),
            "Only hand-screened, legit jobs".into(),
            "No ads, scams, or junk".into(),
            "Expert resources, webinars & events".into(),
            "Unlock this job".into(),
        ]
    }
    pub fn promo_class_patterns() -> Vec<String> {
        vec![
            "similar-jobs".into(),
            "unlock".into(),
            "page-breadcrumb".into(),
            "slick-".into(),
            "promo".into(),
        ]
    }
    pub fn promo_heading_patterns() -> Vec<String> {
        vec![
            "similar jobs".into(),
            "unlock".into(),
            "find your next".into(),
        ]
    }
}

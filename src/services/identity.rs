//! Per-request browser identity and pacing.
//!
//! Nothing here affects extraction correctness; it only shapes headers and
//! the delays around each fetch.

use std::time::Duration;

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::models::{BrowserIdentity, CrawlerConfig, IdentityConfig};
use crate::utils::url::get_domain;

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Identity drawn for one outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub browser: BrowserIdentity,
    pub accept_language: String,
}

/// Curated pools of browser identities and languages.
pub struct IdentityPool {
    config: IdentityConfig,
    cookie_header: Option<String>,
}

impl IdentityPool {
    pub fn new(config: IdentityConfig, crawler: &CrawlerConfig) -> Self {
        Self {
            config,
            cookie_header: crawler.cookie_header(),
        }
    }

    /// Draw browser identity and language independently.
    pub fn draw(&self) -> RequestIdentity {
        let mut rng = rand::rng();
        let browser = self
            .config
            .browsers
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| BrowserIdentity {
                user_agent: "Mozilla/5.0".to_string(),
                sec_ch_ua: None,
                sec_ch_ua_platform: None,
                sec_ch_ua_mobile: None,
            });
        let accept_language = self
            .config
            .accept_languages
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| "en-US,en;q=0.9".to_string());

        RequestIdentity {
            browser,
            accept_language,
        }
    }

    /// Build the header set for a request to `url` discovered on `referer`.
    pub fn headers(
        &self,
        identity: &RequestIdentity,
        url: &str,
        referer: &str,
    ) -> Vec<(String, String)> {
        let mut headers = vec![
            ("User-Agent".to_string(), identity.browser.user_agent.clone()),
            ("Accept".to_string(), ACCEPT.to_string()),
            ("Accept-Language".to_string(), identity.accept_language.clone()),
            ("Cache-Control".to_string(), "no-cache".to_string()),
            ("Pragma".to_string(), "no-cache".to_string()),
            ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
        ];

        if let Some(ua) = &identity.browser.sec_ch_ua {
            headers.push(("Sec-CH-UA".to_string(), ua.clone()));
        }
        if let Some(mobile) = &identity.browser.sec_ch_ua_mobile {
            headers.push(("Sec-CH-UA-Mobile".to_string(), mobile.clone()));
        }
        if let Some(platform) = &identity.browser.sec_ch_ua_platform {
            headers.push(("Sec-CH-UA-Platform".to_string(), platform.clone()));
        }

        let site = match (get_domain(url), get_domain(referer)) {
            (Some(target), Some(source)) if target == source => "same-origin",
            _ => "cross-site",
        };
        headers.push(("Sec-Fetch-Site".to_string(), site.to_string()));
        headers.push(("Sec-Fetch-Mode".to_string(), "navigate".to_string()));
        headers.push(("Sec-Fetch-User".to_string(), "?1".to_string()));
        headers.push(("Sec-Fetch-Dest".to_string(), "document".to_string()));
        headers.push(("Referer".to_string(), referer.to_string()));

        if let Some(cookie) = &self.cookie_header {
            headers.push(("Cookie".to_string(), cookie.clone()));
        }

        headers
    }

    /// Jittered delay before a fetch.
    pub fn pre_fetch_delay(&self) -> Duration {
        jitter(
            self.config.pre_fetch_delay_min_ms,
            self.config.pre_fetch_delay_max_ms,
        )
    }

    /// "Reading" delay after a fetch, growing with response size up to a cap.
    pub fn reading_delay(&self, body_bytes: usize) -> Duration {
        let per_ms = self.config.reading_bytes_per_ms.max(1);
        let scaled = self.config.reading_delay_min_ms + body_bytes as u64 / per_ms;
        Duration::from_millis(scaled.min(self.config.reading_delay_max_ms))
    }
}

/// Uniform delay in `[min_ms, max_ms]`.
pub fn jitter(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
}

// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Resolve a potentially relative URL against a base URL.
///
/// # Examples
/// ```
/// use job_harvester::utils::url::resolve;
///
/// assert_eq!(
///     resolve("https://example.com/path/", "page.html"),
///     Some("https://example.com/path/page.html".to_string())
/// );
/// ```
pub fn resolve(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
    {
        return None;
    }
    let base = Url::parse(base).ok()?;
    let mut joined = base.join(href).ok()?;
    joined.set_fragment(None);
    Some(joined.to_string())
}

/// Extract the lowercase host from a URL.
///
/// # Examples
/// ```
/// use job_harvester::utils::url::get_domain;
///
/// assert_eq!(
///     get_domain("https://Example.com/path"),
///     Some("example.com".to_string())
/// );
/// ```
pub fn get_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Whether the URL's host is one of `hosts` or a subdomain of one.
pub fn host_matches(url: &str, hosts: &[String]) -> bool {
    let Some(domain) = get_domain(url) else {
        return false;
    };
    hosts.iter().any(|host| {
        let host = host.to_lowercase();
        domain == host || domain.ends_with(&format!(".{host}"))
    })
}

/// Read the `page` query parameter.
pub fn page_number(url: &str) -> Option<u32> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}

/// Return `url` with its `page` query parameter set to `page`, appending it if absent.
pub fn with_page(url: &str, page: u32) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    match pairs.iter_mut().find(|(key, _)| key == "page") {
        Some(pair) => pair.1 = page.to_string(),
        None => pairs.push(("page".to_string(), page.to_string())),
    }

    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    Some(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        assert_eq!(
            resolve("https://example.com/path/", "/root.html").as_deref(),
            Some("https://example.com/root.html")
        );
        assert_eq!(
            resolve("https://example.com/path/", "https://other.com/x").as_deref(),
            Some("https://other.com/x")
        );
    }

    #[test]
    fn test_resolve_drops_fragments_and_pseudo_links() {
        assert_eq!(
            resolve("https://example.com/", "/job/1#apply").as_deref(),
            Some("https://example.com/job/1")
        );
        assert_eq!(resolve("https://example.com/", "#top"), None);
        assert_eq!(resolve("https://example.com/", "javascript:void(0)"), None);
    }

    #[test]
    fn test_host_matches_subdomains() {
        let hosts = vec!["flexjobs.com".to_string()];
        assert!(host_matches("https://www.flexjobs.com/publicjobs/a-1", &hosts));
        assert!(host_matches("https://flexjobs.com/x", &hosts));
        assert!(!host_matches("https://notflexjobs.com/x", &hosts));
    }

    #[test]
    fn test_page_number() {
        assert_eq!(page_number("https://e.com/jobs?page=3"), Some(3));
        assert_eq!(page_number("https://e.com/jobs?q=a"), None);
    }

    #[test]
    fn test_with_page_replaces_or_appends() {
        assert_eq!(
            with_page("https://e.com/jobs?q=a&page=3", 4).as_deref(),
            Some("https://e.com/jobs?q=a&page=4")
        );
        assert_eq!(
            with_page("https://e.com/jobs", 2).as_deref(),
            Some("https://e.com/jobs?page=2")
        );
    }
}

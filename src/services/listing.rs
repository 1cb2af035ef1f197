//! Listing page parsing.
//!
//! Finds detail-page links with their card previews, and the next listing page.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::models::{PreviewFields, SiteConfig};
use crate::utils::url::{host_matches, resolve, with_page};
use crate::utils::{clean_text, parse_selectors};

const CARD_SELECTORS: &[&str] = &[
    r#"[data-testid*="job"]"#,
    r#"[data-test*="job"]"#,
    r#"[data-card-type*="job"]"#,
    "article",
    "li",
    ".job-card",
    ".job",
    ".job-listing",
    ".search-result",
    ".search-result-item",
];

const NEXT_RELATION_SELECTORS: &[&str] = &[
    r#"a[rel~="next"]"#,
    r#"link[rel~="next"]"#,
    "a.next",
    ".pagination a.next",
];

/// A detail link found on a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredJob {
    pub url: String,
    pub preview: PreviewFields,
}

/// How the next listing page was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextVia {
    Relation,
    LinkText,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPage {
    pub url: String,
    pub page_index: u32,
    pub via: NextVia,
}

struct CardSelectors {
    title: Vec<Selector>,
    company: Vec<Selector>,
    company_link: Vec<Selector>,
    location: Vec<Selector>,
    time: Vec<Selector>,
    date_text: Vec<Selector>,
    snippet: Vec<Selector>,
}

impl CardSelectors {
    fn new() -> Self {
        Self {
            title: parse_selectors(&[r#"[data-testid*="title"]"#, "h2", "h3", ".job-title"]),
            company: parse_selectors(&["[data-company-name]", ".job-company", ".company", ".employer"]),
            company_link: parse_selectors(&[
                r#"a[href*="/company/"]"#,
                r#"a[href*="/companies/"]"#,
                r#"a[href*="/company-profile/"]"#,
            ]),
            location: parse_selectors(&["[data-location]", ".job-location", ".location", ".job-card-location"]),
            time: parse_selectors(&["time[datetime]"]),
            date_text: parse_selectors(&[".job-date", ".posted", ".listing-date"]),
            snippet: parse_selectors(&[
                ".job-description",
                ".description",
                ".job-snippet",
                ".job-summary",
                "p",
            ]),
        }
    }
}

/// Parses listing pages for one site.
pub struct ListingParser {
    link_selectors: Vec<Selector>,
    card_selectors: Vec<Selector>,
    next_selectors: Vec<Selector>,
    anchor_selector: Vec<Selector>,
    card: CardSelectors,
    url_patterns: Vec<String>,
    hosts: Vec<String>,
}

impl ListingParser {
    pub fn new(site: &SiteConfig) -> Self {
        Self {
            link_selectors: parse_selectors(&site.detail_link_selectors),
            card_selectors: parse_selectors(CARD_SELECTORS),
            next_selectors: parse_selectors(NEXT_RELATION_SELECTORS),
            anchor_selector: parse_selectors(&["a[href]"]),
            card: CardSelectors::new(),
            url_patterns: site.detail_url_patterns.clone(),
            hosts: site.allowed_hosts.clone(),
        }
    }

    /// Whether `url` has the shape of a detail page on this site.
    pub fn is_detail_url(&self, url: &str) -> bool {
        host_matches(url, &self.hosts) && self.url_patterns.iter().any(|p| url.contains(p.as_str()))
    }

    /// Collect detail links in discovery order, merging previews of duplicates.
    pub fn discover_jobs(&self, document: &Html, page_url: &str) -> Vec<DiscoveredJob> {
        let mut jobs: Vec<DiscoveredJob> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for selector in &self.link_selectors {
            for element in document.select(selector) {
                let Some(href) = element
                    .value()
                    .attr("href")
                    .or_else(|| element.value().attr("data-job-url"))
                else {
                    continue;
                };
                let Some(url) = resolve(page_url, href) else {
                    continue;
                };
                if url == page_url || !self.is_detail_url(&url) {
                    continue;
                }

                let preview = self.build_preview(element, page_url);
                match positions.get(&url) {
                    Some(&index) => jobs[index].preview.merge(preview),
                    None => {
                        positions.insert(url.clone(), jobs.len());
                        jobs.push(DiscoveredJob { url, preview });
                    }
                }
            }
        }

        jobs
    }

    /// Find the next listing page: relation link, then link text, then `page=N+1`.
    pub fn next_page(
        &self,
        document: &Html,
        page_url: &str,
        page_index: u32,
        max_pages: u32,
    ) -> Option<NextPage> {
        if page_index >= max_pages {
            return None;
        }
        let page_index = page_index + 1;

        let candidate = |href: &str| resolve(page_url, href).filter(|url| url != page_url);

        let by_relation = self
            .next_selectors
            .iter()
            .flat_map(|sel| document.select(sel))
            .filter_map(|el| el.value().attr("href"))
            .find_map(candidate);
        if let Some(url) = by_relation {
            return Some(NextPage {
                url,
                page_index,
                via: NextVia::Relation,
            });
        }

        let by_text = self
            .anchor_selector
            .iter()
            .flat_map(|sel| document.select(sel))
            .filter(|el| {
                let text = el.text().collect::<String>().trim().to_lowercase();
                text.starts_with("next") || text.starts_with("older")
            })
            .filter_map(|el| el.value().attr("href"))
            .find_map(candidate);
        if let Some(url) = by_text {
            return Some(NextPage {
                url,
                page_index,
                via: NextVia::LinkText,
            });
        }

        with_page(page_url, page_index).map(|url| NextPage {
            url,
            page_index,
            via: NextVia::Synthetic,
        })
    }

    fn find_card<'a>(&self, element: ElementRef<'a>) -> ElementRef<'a> {
        for selector in &self.card_selectors {
            let found = element
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|ancestor| selector.matches(ancestor));
            if let Some(card) = found {
                return card;
            }
        }
        element
            .parent()
            .and_then(ElementRef::wrap)
            .unwrap_or(element)
    }

    fn build_preview(&self, element: ElementRef, page_url: &str) -> PreviewFields {
        let card = self.find_card(element);
        let attr = |name: &str| element.value().attr(name).and_then(clean_text);

        let mut preview = PreviewFields {
            title: first_text(card, &self.card.title).or_else(|| clean_text(&text_of(element))),
            company: first_text(card, &self.card.company)
                .or_else(|| attr("data-company-name"))
                .or_else(|| attr("data-company")),
            company_url: first_match(card, &self.card.company_link)
                .and_then(|el| el.value().attr("href"))
                .and_then(|href| resolve(page_url, href)),
            location: first_text(card, &self.card.location).or_else(|| attr("data-location")),
            date_posted: first_match(card, &self.card.time)
                .and_then(|el| {
                    el.value()
                        .attr("datetime")
                        .and_then(clean_text)
                        .or_else(|| clean_text(&text_of(el)))
                })
                .or_else(|| first_text(card, &self.card.date_text)),
            ..Default::default()
        };

        if let Some(snippet) = first_match(card, &self.card.snippet) {
            preview.description_html = clean_text(&snippet.inner_html()).map(|_| snippet.inner_html().trim().to_string());
            preview.description_text = clean_text(&text_of(snippet));
        }

        let blob = ["data-job-json", "data-job"]
            .iter()
            .find_map(|name| {
                card.value()
                    .attr(name)
                    .or_else(|| element.value().attr(name))
            })
            .and_then(|raw| serde_json::from_str::<Value>(raw.trim().trim_end_matches(';')).ok());
        if let Some(data) = blob {
            apply_card_blob(&mut preview, &data);
        }

        preview
    }
}

/// Fill gaps in a preview from a card's embedded JSON attribute.
fn apply_card_blob(preview: &mut PreviewFields, data: &Value) {
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| data.get(*k).and_then(Value::as_str))
            .and_then(clean_text)
    };

    if preview.company.is_none() {
        preview.company = text(&["companyName", "company", "employer"]);
    }
    if preview.location.is_none() {
        preview.location = text(&["location", "cityState", "city"]);
    }
    if preview.date_posted.is_none() {
        preview.date_posted = text(&["postedDate", "datePosted"]);
    }
    if preview.company_url.is_none() {
        preview.company_url = text(&["companyUrl"]);
    }
    if preview.description_html.is_none() {
        if let Some(html) = ["descriptionHtml", "description_html", "description"]
            .iter()
            .find_map(|k| data.get(*k).and_then(Value::as_str))
            .filter(|s| !s.trim().is_empty())
        {
            preview.description_html = Some(html.trim().to_string());
            if preview.description_text.is_none() {
                preview.description_text = clean_text(&text_of_fragment(html));
            }
        }
    }
    if preview.description_text.is_none() {
        preview.description_text = text(&["shortDescription"]);
    }
}

fn first_match<'a>(scope: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|sel| scope.select(sel).next())
}

fn first_text(scope: ElementRef, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|sel| scope.select(sel).next())
        .find_map(|el| clean_text(&text_of(el)))
}

fn text_of(element: ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

/// Plain text of an HTML fragment.
pub fn text_of_fragment(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    text_of(fragment.root_element())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <ul>
            <li class="job-card">
              <h3><a href="/publicjobs/senior-rust-engineer-123">Senior Rust Engineer</a></h3>
              <span class="job-company">Acme Widgets</span>
              <span class="job-location">US National</span>
              <time datetime="2024-05-01">May 1</time>
              <p class="job-snippet">Build <b>fast</b> things.</p>
            </li>
            <li class="job-card">
              <a href="/publicjobs/senior-rust-engineer-123">Apply</a>
              <a href="https://www.flexjobs.com/publicjobs/data-analyst-456" data-job='{"companyName":"Beta Corp","postedDate":"2024-05-02"}'>Data Analyst</a>
            </li>
            <li><a href="https://other.com/job/789">Elsewhere</a></li>
            <li><a href="/about">About</a></li>
          </ul>
        </body></html>
    "#;

    fn parser() -> ListingParser {
        ListingParser::new(&SiteConfig::default())
    }

    #[test]
    fn discovers_detail_links_in_order_without_duplicates() {
        let doc = Html::parse_document(LISTING);
        let jobs = parser().discover_jobs(&doc, "https://www.flexjobs.com/remote-jobs");

        let urls: Vec<_> = jobs.iter().map(|j| j.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.flexjobs.com/publicjobs/senior-rust-engineer-123",
                "https://www.flexjobs.com/publicjobs/data-analyst-456",
            ]
        );
    }

    #[test]
    fn collects_card_preview() {
        let doc = Html::parse_document(LISTING);
        let jobs = parser().discover_jobs(&doc, "https://www.flexjobs.com/remote-jobs");
        let preview = &jobs[0].preview;

        assert_eq!(preview.title.as_deref(), Some("Senior Rust Engineer"));
        assert_eq!(preview.company.as_deref(), Some("Acme Widgets"));
        assert_eq!(preview.location.as_deref(), Some("US National"));
        assert_eq!(preview.date_posted.as_deref(), Some("2024-05-01"));
        assert_eq!(preview.description_text.as_deref(), Some("Build fast things."));
    }

    #[test]
    fn reads_card_json_blob() {
        let doc = Html::parse_document(LISTING);
        let jobs = parser().discover_jobs(&doc, "https://www.flexjobs.com/remote-jobs");
        let preview = &jobs[1].preview;

        assert_eq!(preview.company.as_deref(), Some("Beta Corp"));
        assert_eq!(preview.date_posted.as_deref(), Some("2024-05-02"));
    }

    #[test]
    fn next_page_prefers_relation_link() {
        let doc = Html::parse_document(
            r#"<a href="?page=9">Next</a><a rel="next" href="/remote-jobs?page=2">2</a>"#,
        );
        let next = parser()
            .next_page(&doc, "https://www.flexjobs.com/remote-jobs", 1, 5)
            .unwrap();
        assert_eq!(next.via, NextVia::Relation);
        assert_eq!(next.url, "https://www.flexjobs.com/remote-jobs?page=2");
        assert_eq!(next.page_index, 2);
    }

    #[test]
    fn next_page_matches_link_text() {
        let doc = Html::parse_document(r#"<a href="/remote-jobs/older">Older posts</a>"#);
        let next = parser()
            .next_page(&doc, "https://www.flexjobs.com/remote-jobs", 1, 5)
            .unwrap();
        assert_eq!(next.via, NextVia::LinkText);
    }

    #[test]
    fn synthetic_page_until_limit() {
        let doc = Html::parse_document("<p>no links</p>");
        let next = parser()
            .next_page(&doc, "https://www.flexjobs.com/remote-jobs?page=3", 3, 5)
            .unwrap();
        assert_eq!(next.via, NextVia::Synthetic);
        assert_eq!(next.url, "https://www.flexjobs.com/remote-jobs?page=4");

        assert!(
            parser()
                .next_page(&doc, "https://www.flexjobs.com/remote-jobs?page=5", 5, 5)
                .is_none()
        );
    }
}

//! Ranked CSS selectors that have matched this site's containers before.

use scraper::{ElementRef, Selector};

use super::{ExtractionContext, Field, FieldMap, Strategy};
use crate::utils::parse_selectors;
use crate::utils::url::resolve;

struct Rule {
    field: Field,
    selectors: Vec<Selector>,
    read: Read,
}

#[derive(Clone, Copy)]
enum Read {
    Text,
    InnerHtml,
    Attr(&'static str),
    Href,
}

pub struct SelectorHeuristicStrategy {
    rules: Vec<Rule>,
}

impl SelectorHeuristicStrategy {
    pub fn new() -> Self {
        let rule = |field, selectors: &[&str], read| Rule {
            field,
            selectors: parse_selectors(selectors),
            read,
        };
        Self {
            rules: vec![
                rule(Field::Title, &["h1", ".job-title"], Read::Text),
                rule(Field::Title, &[r#"meta[property="og:title"]"#], Read::Attr("content")),
                rule(
                    Field::Company,
                    &[
                        r#"[data-testid="company-name"]"#,
                        ".company-name",
                        ".job-company",
                        r#"[itemprop="hiringOrganization"] [itemprop="name"]"#,
                        r#"a[href*="/company/"]"#,
                    ],
                    Read::Text,
                ),
                rule(
                    Field::CompanyUrl,
                    &[r#"a[href*="/company/"]"#, r#"a[href*="/companies/"]"#],
                    Read::Href,
                ),
                rule(
                    Field::Location,
                    &[r#"[data-testid="job-location"]"#, ".job-location", r#"[itemprop="jobLocation"]"#],
                    Read::Text,
                ),
                rule(
                    Field::DescriptionHtml,
                    &[
                        r#"[data-testid="job-description"]"#,
                        "#job-description",
                        ".job-description",
                        ".job-details",
                        r#"[itemprop="description"]"#,
                        "article",
                    ],
                    Read::InnerHtml,
                ),
                rule(Field::DatePosted, &["time[datetime]"], Read::Attr("datetime")),
                rule(Field::DatePosted, &[r#"meta[itemprop="datePosted"]"#], Read::Attr("content")),
                rule(Field::ValidThrough, &[r#"meta[itemprop="validThrough"]"#], Read::Attr("content")),
            ],
        }
    }
}

impl Default for SelectorHeuristicStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for SelectorHeuristicStrategy {
    fn name(&self) -> &'static str {
        "selector-heuristics"
    }

    fn collect(&self, ctx: &ExtractionContext) -> FieldMap {
        let mut map = FieldMap::new();
        for rule in &self.rules {
            for element in rule.selectors.iter().flat_map(|sel| ctx.document.select(sel)) {
                let value = read(element, rule.read, ctx.url);
                let value = match (rule.field, value) {
                    (Field::Title, Some(title)) if matches!(rule.read, Read::Attr(_)) => {
                        Some(strip_site_suffix(&title))
                    }
                    (_, value) => value,
                };
                map.insert_opt(rule.field, value);
            }
        }
        map
    }
}

fn read(element: ElementRef, how: Read, base: &str) -> Option<String> {
    match how {
        Read::Text => Some(element.text().collect::<Vec<_>>().join(" ")),
        Read::InnerHtml => Some(element.inner_html()),
        Read::Attr(name) => element.value().attr(name).map(str::to_string),
        Read::Href => element
            .value()
            .attr("href")
            .and_then(|href| resolve(base, href)),
    }
}

/// "Role | Site" -> "Role".
fn strip_site_suffix(title: &str) -> String {
    title
        .rsplit_once(" | ")
        .map(|(head, _)| head)
        .unwrap_or(title)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn collect(html: &str) -> FieldMap {
        let doc = Html::parse_document(html);
        let ctx = ExtractionContext::new("https://www.flexjobs.com/publicjobs/x", &doc, None);
        SelectorHeuristicStrategy::new().collect(&ctx)
    }

    #[test]
    fn reads_og_title_without_site_suffix() {
        let map = collect(
            r#"<head><meta property="og:title" content="QA Lead | FlexJobs"></head><body></body>"#,
        );
        assert_eq!(map.first(Field::Title), Some("QA Lead"));
    }

    #[test]
    fn heading_ranks_before_og_title() {
        let map = collect(
            r#"<head><meta property="og:title" content="Other | FlexJobs"></head><body><h1>QA Lead</h1></body>"#,
        );
        assert_eq!(map.first(Field::Title), Some("QA Lead"));
    }

    #[test]
    fn reads_company_link_and_dates() {
        let map = collect(
            r#"<body>
              <a href="/company/acme">Acme Widgets</a>
              <time datetime="2024-04-05T10:00:00Z">Apr 5</time>
              <div class="job-description"><p>Do things.</p></div>
            </body>"#,
        );
        assert_eq!(map.first(Field::Company), Some("Acme Widgets"));
        assert_eq!(
            map.first(Field::CompanyUrl),
            Some("https://www.flexjobs.com/company/acme")
        );
        assert_eq!(map.first(Field::DatePosted), Some("2024-04-05T10:00:00Z"));
        assert_eq!(map.first(Field::DescriptionHtml), Some("<p>Do things.</p>"));
    }
}

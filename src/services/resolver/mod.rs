//! Multi-source field resolution.
//!
//! Every strategy reads the same [`ExtractionContext`] and reports the values
//! it can see. The resolver walks strategies in priority order and keeps the
//! first candidate per field that survives normalization.

mod embedded;
mod heuristics;
mod metadata;
mod preview;
mod structured;

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::models::{PreviewFields, ResolverConfig, SchedulePolicy, SiteConfig};
use crate::utils::clean_text;

pub use embedded::EmbeddedScriptStrategy;
pub use heuristics::SelectorHeuristicStrategy;
pub use metadata::MetadataListStrategy;
pub use preview::ListingPreviewStrategy;
pub use structured::{StructuredDataStrategy, find_job_posting};

/// Canonical record fields a strategy can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Company,
    CompanyUrl,
    Location,
    RemoteLevel,
    JobType,
    Schedule,
    Salary,
    Benefits,
    CareerLevel,
    DescriptionHtml,
    DatePosted,
    ValidThrough,
    /// Translated structured employment-type code
    EmploymentType,
}

/// Candidate values reported by one strategy, in the order it found them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    values: HashMap<Field, Vec<String>>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a candidate. Whitespace is collapsed except for description markup.
    pub fn insert(&mut self, field: Field, value: impl AsRef<str>) {
        let value = value.as_ref();
        let normalized = match field {
            Field::DescriptionHtml => {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            _ => clean_text(value),
        };
        if let Some(normalized) = normalized {
            self.values.entry(field).or_default().push(normalized);
        }
    }

    pub fn insert_opt(&mut self, field: Field, value: Option<impl AsRef<str>>) {
        if let Some(value) = value {
            self.insert(field, value);
        }
    }

    pub fn get(&self, field: Field) -> &[String] {
        self.values.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, field: Field) -> Option<&str> {
        self.get(field).first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Read-only inputs for resolving one detail page.
pub struct ExtractionContext<'a> {
    pub url: &'a str,
    pub document: &'a Html,
    /// First JobPosting found in JSON-LD blocks
    pub structured_data: Option<Value>,
    pub preview: Option<&'a PreviewFields>,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(url: &'a str, document: &'a Html, preview: Option<&'a PreviewFields>) -> Self {
        Self {
            url,
            document,
            structured_data: json_ld_posting(document),
            preview,
        }
    }
}

fn json_ld_posting(document: &Html) -> Option<Value> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    document.select(&selector).find_map(|script| {
        let raw = script.text().collect::<String>();
        match parse_json_tolerant(&raw) {
            Some(value) => find_job_posting(&value).cloned(),
            None => {
                log::debug!("Ignoring malformed JSON-LD block ({} bytes)", raw.len());
                None
            }
        }
    })
}

/// Parse JSON that may carry a trailing semicolon or surrounding whitespace.
pub(crate) fn parse_json_tolerant(raw: &str) -> Option<Value> {
    let trimmed = raw.trim().trim_end_matches(';').trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// One source of field values.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn collect(&self, ctx: &ExtractionContext) -> FieldMap;
}

/// Final per-field values for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFields {
    pub title: Option<String>,
    pub company: Option<String>,
    pub company_url: Option<String>,
    pub location: Option<String>,
    pub remote_level: Option<String>,
    pub job_type: Option<String>,
    pub schedule: Option<String>,
    pub salary: Option<String>,
    pub benefits: Option<String>,
    pub career_level: Option<String>,
    /// Raw description fragments, best source first
    pub description_candidates: Vec<String>,
    pub date_posted: Option<String>,
    pub valid_through: Option<String>,
}

/// Runs strategies in priority order and applies per-field acceptance rules.
pub struct FieldResolver {
    strategies: Vec<Box<dyn Strategy>>,
    brand_names: Vec<String>,
    /// Placeholder phrases, as word lists
    masked_company_phrases: Vec<Vec<String>>,
    schedule_policy: SchedulePolicy,
}

impl FieldResolver {
    /// Resolver with the standard five strategies.
    pub fn new(site: &SiteConfig, config: &ResolverConfig) -> Self {
        let strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(MetadataListStrategy::new()),
            Box::new(StructuredDataStrategy),
            Box::new(EmbeddedScriptStrategy::new()),
            Box::new(SelectorHeuristicStrategy::new()),
            Box::new(ListingPreviewStrategy),
        ];
        Self::with_strategies(strategies, site, config)
    }

    pub fn with_strategies(
        strategies: Vec<Box<dyn Strategy>>,
        site: &SiteConfig,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            strategies,
            brand_names: site.brand_names.iter().map(|b| compact(b)).collect(),
            masked_company_phrases: site
                .masked_company_phrases
                .iter()
                .map(|p| words(p))
                .filter(|w| !w.is_empty())
                .collect(),
            schedule_policy: config.schedule_policy,
        }
    }

    pub fn resolve(&self, ctx: &ExtractionContext) -> ResolvedFields {
        let maps: Vec<FieldMap> = self
            .strategies
            .iter()
            .map(|strategy| {
                let map = strategy.collect(ctx);
                log::debug!(
                    "{} strategy reported {} field(s) for {}",
                    strategy.name(),
                    map.len(),
                    ctx.url
                );
                map
            })
            .collect();

        let any = |value: &str| Some(value.to_string());

        let job_type_label = pick(&maps, Field::JobType, any);
        let schedule_label = pick(&maps, Field::Schedule, any);
        let employment_type = pick(&maps, Field::EmploymentType, any);

        let schedule = match self.schedule_policy {
            SchedulePolicy::LabelOnly => schedule_label,
            SchedulePolicy::EmploymentTypeFallback => schedule_label.or_else(|| {
                job_type_label
                    .as_ref()
                    .and(employment_type.clone())
            }),
        };
        let job_type = job_type_label.or(employment_type);

        ResolvedFields {
            title: pick(&maps, Field::Title, any),
            company: pick(&maps, Field::Company, |v| self.accept_company(v)),
            company_url: pick(&maps, Field::CompanyUrl, accept_http_url),
            location: pick(&maps, Field::Location, any),
            remote_level: pick(&maps, Field::RemoteLevel, any),
            job_type,
            schedule,
            salary: pick(&maps, Field::Salary, any),
            benefits: pick(&maps, Field::Benefits, any),
            career_level: pick(&maps, Field::CareerLevel, any),
            description_candidates: maps
                .iter()
                .flat_map(|m| m.get(Field::DescriptionHtml).iter().cloned())
                .collect(),
            date_posted: pick(&maps, Field::DatePosted, normalize_date),
            valid_through: pick(&maps, Field::ValidThrough, normalize_date),
        }
    }

    /// Reject masked placeholders and the site's own brand.
    fn accept_company(&self, value: &str) -> Option<String> {
        let value_words = words(value);
        if self.masked_company_phrases.iter().any(|phrase| {
            value_words
                .windows(phrase.len())
                .any(|window| window == phrase.as_slice())
        }) {
            return None;
        }
        let compacted = compact(value);
        if self
            .brand_names
            .iter()
            .any(|brand| compacted == *brand || compacted == format!("{brand}com"))
        {
            return None;
        }
        Some(value.to_string())
    }
}

/// Lowercased alphanumeric words, so phrases only match on word boundaries.
fn words(value: &str) -> Vec<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn pick(
    maps: &[FieldMap],
    field: Field,
    accept: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    maps.iter()
        .flat_map(|map| map.get(field))
        .find_map(|value| accept(value))
}

/// Lowercase alphanumerics only.
fn compact(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn accept_http_url(value: &str) -> Option<String> {
    let parsed = url::Url::parse(value).ok()?;
    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

/// Normalize a date-like string to RFC 3339 UTC, or `None` if unparseable.
pub fn normalize_date(value: &str) -> Option<String> {
    let text = value.trim();
    let format = |dt: DateTime<Utc>| dt.to_rfc3339_opts(SecondsFormat::Secs, true);

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(format(dt.with_timezone(&Utc)));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(format(dt.with_timezone(&Utc)));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
            return Some(format(naive.and_utc()));
        }
    }

    let iso = Regex::new(r"\d{4}-\d{2}-\d{2}").ok()?;
    let candidates = iso
        .find(text)
        .map(|m| (m.as_str().to_string(), "%Y-%m-%d"))
        .into_iter()
        .chain(
            ["%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%Y/%m/%d"]
                .into_iter()
                .map(|p| (text.to_string(), p)),
        );
    for (candidate, pattern) in candidates {
        if let Ok(date) = NaiveDate::parse_from_str(&candidate, pattern) {
            return date.and_hms_opt(0, 0, 0).map(|dt| format(dt.and_utc()));
        }
    }
    None
}

/// Human label for a schema.org employment-type code.
pub fn employment_type_label(code: &str) -> Option<String> {
    let key = code.trim().to_uppercase().replace(['-', ' '], "_");
    let label = match key.as_str() {
        "FULL_TIME" => "Full-Time",
        "PART_TIME" => "Part-Time",
        "CONTRACTOR" | "CONTRACT" => "Contractor",
        "TEMPORARY" => "Temporary",
        "INTERN" | "INTERNSHIP" => "Internship",
        "VOLUNTEER" => "Volunteer",
        "PER_DIEM" => "Per Diem",
        "OTHER" => "Other",
        _ => return clean_text(code),
    };
    Some(label.to_string())
}

/// Plain text of a JSON scalar (or the first usable array element).
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_text(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(value_text),
        Value::Object(map) => ["name", "value", "date", "text"]
            .iter()
            .find_map(|k| map.get(*k).and_then(value_text)),
        _ => None,
    }
}

/// Escape text for inclusion in generated markup.
pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

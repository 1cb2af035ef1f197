//! schema.org JobPosting mapping.

use scraper::Html;
use serde_json::{Map, Value};

use super::{
    ExtractionContext, Field, FieldMap, Strategy, employment_type_label, escape_html, value_text,
};
use crate::utils::clean_text;

/// Reads the JSON-LD JobPosting captured in the context.
pub struct StructuredDataStrategy;

impl Strategy for StructuredDataStrategy {
    fn name(&self) -> &'static str {
        "structured-data"
    }

    fn collect(&self, ctx: &ExtractionContext) -> FieldMap {
        ctx.structured_data
            .as_ref()
            .map(posting_fields)
            .unwrap_or_default()
    }
}

fn is_job_posting(object: &Map<String, Value>) -> bool {
    ["@type", "type"].iter().any(|key| match object.get(*key) {
        Some(Value::String(t)) => t == "JobPosting",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("JobPosting")),
        _ => false,
    })
}

/// Depth-first search for a JobPosting object, through arrays, `@graph`
/// containers and `jobPosting` wrappers.
pub fn find_job_posting(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_job_posting),
        Value::Object(object) => {
            if is_job_posting(object) {
                return Some(value);
            }
            if let Some(found) = object.get("jobPosting").and_then(find_job_posting) {
                return Some(found);
            }
            object
                .values()
                .filter(|v| v.is_object() || v.is_array())
                .find_map(find_job_posting)
        }
        _ => None,
    }
}

/// Map a JobPosting-like object onto canonical fields.
pub(crate) fn posting_fields(posting: &Value) -> FieldMap {
    let mut map = FieldMap::new();
    let field = |key: &str| posting.get(key);
    let text = |keys: &[&str]| keys.iter().find_map(|k| posting.get(*k).and_then(value_text));

    map.insert_opt(Field::Title, text(&["title", "name"]));

    match field("hiringOrganization") {
        Some(Value::String(name)) => map.insert(Field::Company, name),
        Some(org @ Value::Object(_)) => {
            map.insert_opt(
                Field::Company,
                ["name", "legalName", "alternateName"]
                    .iter()
                    .find_map(|k| org.get(*k).and_then(value_text)),
            );
            map.insert_opt(
                Field::CompanyUrl,
                ["sameAs", "url"]
                    .iter()
                    .find_map(|k| org.get(*k).and_then(value_text)),
            );
        }
        _ => {}
    }
    map.insert_opt(Field::Company, text(&["companyName"]));

    let remote = field("jobLocationType")
        .and_then(value_text)
        .is_some_and(|t| {
            let t = t.to_lowercase();
            t.contains("telecommute") || t.contains("remote")
        });
    map.insert_opt(Field::Location, field("jobLocation").and_then(location_text));
    if remote {
        map.insert(Field::Location, "Remote");
        map.insert(Field::RemoteLevel, "Remote");
    }

    if let Some(types) = field("employmentType") {
        let labels: Vec<String> = match types {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(employment_type_label)
                .collect(),
            Value::String(code) => code
                .split(',')
                .filter_map(employment_type_label)
                .collect(),
            _ => Vec::new(),
        };
        if !labels.is_empty() {
            map.insert(Field::EmploymentType, labels.join(", "));
        }
    }

    map.insert_opt(Field::Salary, field("baseSalary").and_then(salary_text));

    if let Some(description) = ["descriptionHtml", "description"]
        .iter()
        .find_map(|k| posting.get(*k).and_then(Value::as_str))
    {
        map.insert_opt(Field::DescriptionHtml, description_markup(description));
    }

    map.insert_opt(
        Field::DatePosted,
        text(&["datePosted", "datePublished", "postedDate"]),
    );
    map.insert_opt(Field::ValidThrough, text(&["validThrough", "expirationDate"]));

    map
}

/// "Locality, Region, Country" from the first usable location.
fn location_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_text(s),
        Value::Array(items) => items.iter().find_map(location_text),
        Value::Object(place) => {
            let from_address = match place.get("address") {
                Some(Value::String(s)) => clean_text(s),
                Some(Value::Object(address)) => {
                    let parts: Vec<String> = ["addressLocality", "addressRegion", "addressCountry"]
                        .iter()
                        .filter_map(|k| address.get(*k).and_then(value_text))
                        .collect();
                    clean_text(&parts.join(", "))
                }
                _ => None,
            };
            from_address.or_else(|| place.get("name").and_then(value_text))
        }
        _ => None,
    }
}

/// Render a MonetaryAmount (or bare value) as display text.
fn salary_text(value: &Value) -> Option<String> {
    let amount = match value {
        Value::String(_) | Value::Number(_) => return value_text(value),
        Value::Object(amount) => amount,
        _ => return None,
    };

    let quantity = match amount.get("value") {
        Some(Value::Object(q)) => q,
        _ => amount,
    };
    let get = |k: &str| quantity.get(k).and_then(value_text);

    let range = match (get("minValue"), get("maxValue")) {
        (Some(min), Some(max)) if min != max => Some(format!("{min} - {max}")),
        (Some(min), _) => Some(min),
        (None, max) => max,
    };
    let figure = match quantity.get("value") {
        Some(v @ (Value::String(_) | Value::Number(_))) => value_text(v),
        _ => None,
    }
    .or(range)?;

    let mut out = String::new();
    if let Some(currency) = amount.get("currency").and_then(value_text) {
        out.push_str(&currency);
        out.push(' ');
    }
    out.push_str(&figure);
    if let Some(unit) = get("unitText") {
        out.push_str(" per ");
        out.push_str(&unit.to_lowercase());
    }
    Some(out)
}

/// Structured descriptions may be markup, escaped markup, or plain text.
fn description_markup(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains('<') {
        return Some(raw.to_string());
    }
    if raw.contains("&lt;") {
        let decoded: String = Html::parse_fragment(raw).root_element().text().collect();
        return Some(decoded.trim().to_string());
    }
    Some(
        raw.split("\n\n")
            .filter_map(clean_text)
            .map(|para| format!("<p>{}</p>", escape_html(&para)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_posting_in_graph_and_wrappers() {
        let doc = json!({"@graph": [{"@type": "Organization"}, {"@type": ["Thing", "JobPosting"], "title": "A"}]});
        assert_eq!(find_job_posting(&doc).unwrap()["title"], "A");

        let wrapped = json!({"props": {"pageProps": {"jobPosting": {"title": "B", "type": "JobPosting"}}}});
        assert_eq!(find_job_posting(&wrapped).unwrap()["title"], "B");

        assert!(find_job_posting(&json!([1, "x", {"@type": "Person"}])).is_none());
    }

    #[test]
    fn maps_posting_fields() {
        let posting = json!({
            "@type": "JobPosting",
            "title": "Engineer",
            "hiringOrganization": {"@type": "Organization", "name": "Acme", "url": "https://acme.example"},
            "jobLocation": [{"address": {"addressLocality": "Denver", "addressRegion": "CO", "addressCountry": {"name": "US"}}}],
            "employmentType": ["FULL_TIME", "CONTRACTOR"],
            "baseSalary": {"currency": "USD", "value": {"minValue": 90000, "maxValue": 120000, "unitText": "YEAR"}},
            "description": "First paragraph.\n\nSecond & last.",
            "datePosted": "2024-01-02"
        });
        let map = posting_fields(&posting);

        assert_eq!(map.first(Field::Title), Some("Engineer"));
        assert_eq!(map.first(Field::Company), Some("Acme"));
        assert_eq!(map.first(Field::CompanyUrl), Some("https://acme.example"));
        assert_eq!(map.first(Field::Location), Some("Denver, CO, US"));
        assert_eq!(map.first(Field::EmploymentType), Some("Full-Time, Contractor"));
        assert_eq!(map.first(Field::Salary), Some("USD 90000 - 120000 per year"));
        assert_eq!(
            map.first(Field::DescriptionHtml),
            Some("<p>First paragraph.</p><p>Second &amp; last.</p>")
        );
        assert_eq!(map.first(Field::DatePosted), Some("2024-01-02"));
    }

    #[test]
    fn telecommute_means_remote() {
        let map = posting_fields(&json!({"@type": "JobPosting", "jobLocationType": "TELECOMMUTE"}));
        assert_eq!(map.first(Field::Location), Some("Remote"));
        assert_eq!(map.first(Field::RemoteLevel), Some("Remote"));
    }

    #[test]
    fn decodes_escaped_markup() {
        assert_eq!(
            description_markup("&lt;p&gt;Hello&lt;/p&gt;").as_deref(),
            Some("<p>Hello</p>")
        );
    }
}

//! Job data embedded in inline scripts.
//!
//! Page state blobs are rarely valid top-level JSON, so each script is tried
//! three ways: as a whole, as `something = {...}` assignments, and as any
//! brace-balanced object literal.

use regex::Regex;
use scraper::Selector;
use serde_json::Value;

use super::structured::{find_job_posting, posting_fields};
use super::{ExtractionContext, FieldMap, Strategy, parse_json_tolerant};
use crate::utils::parse_selectors;

/// Scripts shorter than this cannot hold a useful posting.
const MIN_SCRIPT_LEN: usize = 80;
/// Largest object literal worth handing to the JSON parser.
const MAX_CHUNK_LEN: usize = 200_000;
/// Parse attempts per script during brace scanning.
const MAX_SCAN_ATTEMPTS: usize = 64;

const POSTING_HINTS: &[&str] = &["jobposting", "hiringorganization", "dateposted", "employmenttype"];

pub struct EmbeddedScriptStrategy {
    scripts: Vec<Selector>,
    assignment: Option<Regex>,
}

impl EmbeddedScriptStrategy {
    pub fn new() -> Self {
        let assignment = Regex::new(
            r"(?:window\.__[A-Za-z0-9_]+__|Drupal\.settings|window\.[A-Za-z_$][\w$]*|var\s+[A-Za-z_$][\w$]*)\s*=\s*\{",
        )
        .map_err(|e| log::warn!("Assignment pattern rejected: {e}"))
        .ok();
        Self {
            scripts: parse_selectors(&["script:not([src])"]),
            assignment,
        }
    }

    /// Candidate JSON documents from one script body.
    fn candidates(&self, script_type: &str, raw: &str) -> Vec<Value> {
        if let Some(direct) = parse_json_tolerant(raw) {
            return vec![direct];
        }
        if script_type.contains("json") {
            log::debug!("Ignoring malformed JSON script ({} bytes)", raw.len());
            return Vec::new();
        }

        let mut found = Vec::new();

        if let Some(pattern) = &self.assignment {
            for m in pattern.find_iter(raw) {
                let start = m.end() - 1;
                if let Some(value) = balanced_object(raw, start).and_then(parse_json_tolerant) {
                    found.push(value);
                }
            }
        }

        if found.is_empty() {
            found.extend(scan_objects(raw));
        }
        found
    }
}

impl Default for EmbeddedScriptStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for EmbeddedScriptStrategy {
    fn name(&self) -> &'static str {
        "embedded-script"
    }

    fn collect(&self, ctx: &ExtractionContext) -> FieldMap {
        for script in self.scripts.iter().flat_map(|sel| ctx.document.select(sel)) {
            let script_type = script.value().attr("type").unwrap_or("").to_lowercase();
            if script_type == "application/ld+json" {
                continue;
            }
            let raw = script.text().collect::<String>();
            if raw.len() < MIN_SCRIPT_LEN {
                continue;
            }
            let lower = raw.to_lowercase();
            if !script_type.contains("json") && !POSTING_HINTS.iter().any(|h| lower.contains(h)) {
                continue;
            }

            for candidate in self.candidates(&script_type, &raw) {
                if let Some(posting) = find_job_posting(&candidate).or_else(|| find_posting_shaped(&candidate)) {
                    return posting_fields(posting);
                }
            }
        }
        FieldMap::new()
    }
}

/// An object with a title and at least one other posting attribute.
fn find_posting_shaped(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_posting_shaped),
        Value::Object(object) => {
            let shaped = object.get("title").is_some_and(Value::is_string)
                && ["hiringOrganization", "employmentType", "datePosted", "jobLocation"]
                    .iter()
                    .any(|k| object.contains_key(*k));
            if shaped {
                return Some(value);
            }
            object.values().find_map(find_posting_shaped)
        }
        _ => None,
    }
}

/// The `{...}` literal starting at byte `start`, honouring string escapes.
fn balanced_object(source: &str, start: usize) -> Option<&str> {
    let bytes = source.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string: Option<u8> = None;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if offset > MAX_CHUNK_LEN {
            return None;
        }
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == quote {
                in_string = None;
            }
            continue;
        }
        match byte {
            b'"' | b'\'' => in_string = Some(byte),
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return source.get(start..=start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse every top-level object literal that is valid JSON.
fn scan_objects(source: &str) -> Vec<Value> {
    let mut found = Vec::new();
    let mut attempts = 0;
    let mut cursor = 0;

    while attempts < MAX_SCAN_ATTEMPTS {
        let Some(relative) = source.get(cursor..).and_then(|rest| rest.find('{')) else {
            break;
        };
        let start = cursor + relative;
        attempts += 1;

        match balanced_object(source, start) {
            Some(chunk) => match serde_json::from_str::<Value>(chunk) {
                Ok(value) => {
                    found.push(value);
                    cursor = start + chunk.len();
                }
                Err(_) => cursor = start + 1,
            },
            None => cursor = start + 1,
        }
    }
    found
}

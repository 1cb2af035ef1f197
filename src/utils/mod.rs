//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod url;

use scraper::Selector;

use crate::error::{AppError, Result};

/// Collapse whitespace runs (including non-breaking spaces) and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize text and drop it if nothing remains.
pub fn clean_text(s: &str) -> Option<String> {
    let cleaned = normalize_whitespace(s);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Parse a CSS selector, mapping failures to [`AppError::Selector`].
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Parse a list of selectors, skipping (and logging) invalid ones.
pub fn parse_selectors<S: AsRef<str>>(list: &[S]) -> Vec<Selector> {
    list.iter()
        .filter_map(|s| match parse_selector(s.as_ref()) {
            Ok(sel) => Some(sel),
            Err(e) => {
                ::log::warn!("Skipping selector: {}", e);
                None
            }
        })
        .collect()
}

//! Job record and listing preview structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized job posting, emitted once per resolved detail page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    /// Site label, e.g. "flexjobs"
    pub source: String,

    /// Detail page URL
    pub url: String,

    /// Job title (always present)
    pub title: String,

    pub company: Option<String>,
    pub company_url: Option<String>,
    pub location: Option<String>,
    pub remote_level: Option<String>,

    /// Employee / Freelance / Contract ...
    pub job_type: Option<String>,

    /// Full-Time / Part-Time ...
    pub schedule: Option<String>,

    pub salary: Option<String>,
    pub benefits: Option<String>,
    pub career_level: Option<String>,
    pub description_html: Option<String>,
    pub description_text: Option<String>,

    /// RFC 3339 timestamp
    pub date_posted: Option<String>,

    /// RFC 3339 timestamp
    pub valid_through: Option<String>,

    pub scraped_at: DateTime<Utc>,
}

/// Non-authoritative fields captured from a listing card.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreviewFields {
    pub title: Option<String>,
    pub company: Option<String>,
    pub company_url: Option<String>,
    pub location: Option<String>,
    pub date_posted: Option<String>,
    pub description_html: Option<String>,
    pub description_text: Option<String>,
}

impl PreviewFields {
    /// Merge another preview into this one, keeping the longer value per field.
    pub fn merge(&mut self, other: PreviewFields) {
        fn keep_longer(current: &mut Option<String>, candidate: Option<String>) {
            if let Some(value) = candidate {
                let replace = match current {
                    Some(existing) => value.len() > existing.len(),
                    None => true,
                };
                if replace {
                    *current = Some(value);
                }
            }
        }

        keep_longer(&mut self.title, other.title);
        keep_longer(&mut self.company, other.company);
        keep_longer(&mut self.company_url, other.company_url);
        keep_longer(&mut self.location, other.location);
        keep_longer(&mut self.date_posted, other.date_posted);
        keep_longer(&mut self.description_html, other.description_html);
        keep_longer(&mut self.description_text, other.description_text);
    }

    pub fn is_empty(&self) -> bool {
        *self == PreviewFields::default()
    }
}

//! Record assembly.

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::JobRecord;
use crate::services::resolver::ResolvedFields;
use crate::services::sanitizer::Description;

pub struct RecordAssembler {
    source: String,
}

impl RecordAssembler {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Build the immutable record for `url`. Fails when no title was resolved.
    pub fn assemble(
        &self,
        url: &str,
        fields: ResolvedFields,
        description: Description,
    ) -> Result<JobRecord> {
        let title = fields.title.ok_or_else(|| AppError::ExtractionIncomplete {
            url: url.to_string(),
        })?;

        Ok(JobRecord {
            source: self.source.clone(),
            url: url.to_string(),
            title,
            company: fields.company,
            company_url: fields.company_url,
            location: fields.location,
            remote_level: fields.remote_level,
            job_type: fields.job_type,
            schedule: fields.schedule,
            salary: fields.salary,
            benefits: fields.benefits,
            career_level: fields.career_level,
            description_html: description.html,
            description_text: description.text,
            date_posted: fields.date_posted,
            valid_through: fields.valid_through,
            scraped_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_title() {
        let assembler = RecordAssembler::new("flexjobs");
        let err = assembler
            .assemble("https://x/job/1", ResolvedFields::default(), Description::default())
            .unwrap_err();
        assert!(matches!(err, AppError::ExtractionIncomplete { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn copies_fields() {
        let assembler = RecordAssembler::new("flexjobs");
        let fields = ResolvedFields {
            title: Some("Engineer".into()),
            company: Some("Acme".into()),
            schedule: Some("Full-Time".into()),
            ..Default::default()
        };
        let description = Description {
            html: Some("<p>x</p>".into()),
            text: Some("x".into()),
        };
        let record = assembler
            .assemble("https://x/job/1", fields, description)
            .unwrap();

        assert_eq!(record.source, "flexjobs");
        assert_eq!(record.title, "Engineer");
        assert_eq!(record.company.as_deref(), Some("Acme"));
        assert_eq!(record.schedule.as_deref(), Some("Full-Time"));
        assert_eq!(record.job_type, None);
        assert_eq!(record.description_text.as_deref(), Some("x"));
    }
}

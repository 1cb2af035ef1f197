//! Last resort: what the listing card showed.

use super::{ExtractionContext, Field, FieldMap, Strategy, escape_html};

pub struct ListingPreviewStrategy;

impl Strategy for ListingPreviewStrategy {
    fn name(&self) -> &'static str {
        "listing-preview"
    }

    fn collect(&self, ctx: &ExtractionContext) -> FieldMap {
        let mut map = FieldMap::new();
        let Some(preview) = ctx.preview else {
            return map;
        };

        map.insert_opt(Field::Title, preview.title.as_ref());
        map.insert_opt(Field::Company, preview.company.as_ref());
        map.insert_opt(Field::CompanyUrl, preview.company_url.as_ref());
        map.insert_opt(Field::Location, preview.location.as_ref());
        map.insert_opt(Field::DatePosted, preview.date_posted.as_ref());
        map.insert_opt(Field::DescriptionHtml, preview.description_html.as_ref());
        map.insert_opt(
            Field::DescriptionHtml,
            preview
                .description_text
                .as_ref()
                .map(|text| format!("<p>{}</p>", escape_html(text))),
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PreviewFields;
    use scraper::Html;

    #[test]
    fn uses_preview_values() {
        let doc = Html::parse_document("<p></p>");
        let preview = PreviewFields {
            title: Some("Card Title".into()),
            description_text: Some("Short <summary>".into()),
            ..Default::default()
        };
        let ctx = ExtractionContext::new("https://example.com/job/1", &doc, Some(&preview));
        let map = ListingPreviewStrategy.collect(&ctx);

        assert_eq!(map.first(Field::Title), Some("Card Title"));
        assert_eq!(
            map.first(Field::DescriptionHtml),
            Some("<p>Short &lt;summary&gt;</p>")
        );
    }

    #[test]
    fn nothing_without_preview() {
        let doc = Html::parse_document("<p></p>");
        let ctx = ExtractionContext::new("https://example.com/job/1", &doc, None);
        assert!(ListingPreviewStrategy.collect(&ctx).is_empty());
    }
}

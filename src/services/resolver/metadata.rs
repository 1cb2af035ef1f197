//! Labelled metadata list next to the job heading.

use scraper::{ElementRef, Selector};

use super::{ExtractionContext, Field, FieldMap, Strategy};
use crate::utils::{clean_text, parse_selectors};

/// Label vocabulary, after normalization.
const VOCABULARY: &[(&str, Field)] = &[
    ("remote level", Field::RemoteLevel),
    ("remote", Field::RemoteLevel),
    ("location", Field::Location),
    ("job location", Field::Location),
    ("salary", Field::Salary),
    ("salary range", Field::Salary),
    ("compensation", Field::Salary),
    ("benefits", Field::Benefits),
    ("job type", Field::JobType),
    ("employment type", Field::JobType),
    ("job schedule", Field::Schedule),
    ("schedule", Field::Schedule),
    ("career level", Field::CareerLevel),
    ("experience level", Field::CareerLevel),
    ("company", Field::Company),
    ("company name", Field::Company),
    ("employer", Field::Company),
];

/// Lowercase, punctuation stripped, whitespace collapsed.
pub fn normalize_label(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn canonical_field(label: &str) -> Option<Field> {
    let normalized = normalize_label(label);
    VOCABULARY
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, field)| *field)
}

pub struct MetadataListStrategy {
    heading: Vec<Selector>,
    main: Vec<Selector>,
    lists: Vec<Selector>,
    labels: Vec<Selector>,
    paragraph: Vec<Selector>,
}

impl MetadataListStrategy {
    pub fn new() -> Self {
        Self {
            heading: parse_selectors(&["h1"]),
            main: parse_selectors(&["main"]),
            lists: parse_selectors(&["ul, ol, dl"]),
            labels: parse_selectors(&["h5", "h4", "h6", "dt", "strong", ".label"]),
            paragraph: parse_selectors(&["p"]),
        }
    }

    /// The `main` holding the heading, else the first `main`.
    fn scope<'a>(&self, ctx: &ExtractionContext<'a>) -> Option<ElementRef<'a>> {
        let heading = self
            .heading
            .iter()
            .find_map(|sel| ctx.document.select(sel).next());
        heading
            .and_then(|h1| {
                h1.ancestors()
                    .filter_map(ElementRef::wrap)
                    .find(|el| el.value().name() == "main")
            })
            .or_else(|| {
                self.main
                    .iter()
                    .find_map(|sel| ctx.document.select(sel).next())
            })
    }

    fn find_list<'a>(&self, root: ElementRef<'a>) -> Option<(ElementRef<'a>, Vec<(Field, String)>)> {
        self.lists
            .iter()
            .flat_map(|sel| root.select(sel))
            .map(|list| (list, self.pairs(list)))
            .find(|(_, pairs)| !pairs.is_empty())
    }

    /// Recognized `(field, value)` pairs of a list's items.
    fn pairs(&self, list: ElementRef) -> Vec<(Field, String)> {
        let children = list.children().filter_map(ElementRef::wrap);

        if list.value().name() == "dl" {
            let mut pairs = Vec::new();
            let mut label: Option<Field> = None;
            for child in children {
                match child.value().name() {
                    "dt" => label = canonical_field(&text_of(child)),
                    "dd" => {
                        if let (Some(field), Some(value)) = (label.take(), clean_text(&text_of(child))) {
                            pairs.push((field, value));
                        }
                    }
                    _ => {}
                }
            }
            return pairs;
        }

        children
            .filter(|child| child.value().name() == "li")
            .filter_map(|item| self.item_pair(item))
            .collect()
    }

    fn item_pair(&self, item: ElementRef) -> Option<(Field, String)> {
        let label = self
            .labels
            .iter()
            .find_map(|sel| item.select(sel).next())?;
        let label_text = text_of(label);
        let field = canonical_field(&label_text)?;

        let value = label
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find_map(|sibling| clean_text(&text_of(sibling)))
            .or_else(|| {
                self.paragraph
                    .iter()
                    .filter_map(|sel| item.select(sel).next())
                    .find_map(|p| clean_text(&text_of(p)))
            })
            .or_else(|| clean_text(&text_of(item).replacen(label_text.as_str(), "", 1)))?;

        Some((field, value))
    }
}

impl Default for MetadataListStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for MetadataListStrategy {
    fn name(&self) -> &'static str {
        "metadata-list"
    }

    fn collect(&self, ctx: &ExtractionContext) -> FieldMap {
        let mut map = FieldMap::new();
        let scope = self.scope(ctx);

        if let Some(h1) = scope
            .into_iter()
            .flat_map(|main| self.heading.iter().filter_map(move |sel| main.select(sel).next()))
            .next()
        {
            map.insert(Field::Title, text_of(h1));
        }

        let found = scope
            .and_then(|main| self.find_list(main))
            .or_else(|| self.find_list(ctx.document.root_element()));

        match found {
            Some((list, pairs)) => {
                for (field, value) in pairs {
                    map.insert(field, value);
                }
                // Description is whatever follows the block holding the list.
                let following: String = list
                    .parent()
                    .and_then(ElementRef::wrap)
                    .map(|parent| {
                        parent
                            .next_siblings()
                            .filter_map(ElementRef::wrap)
                            .map(|el| el.html())
                            .collect()
                    })
                    .unwrap_or_default();
                map.insert(Field::DescriptionHtml, following);
            }
            None => {
                if let Some(main) = scope {
                    map.insert(Field::DescriptionHtml, main.inner_html());
                }
            }
        }

        map
    }
}

fn text_of(element: ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

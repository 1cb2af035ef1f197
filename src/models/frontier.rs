//! Frontier work items.

use crate::models::PreviewFields;

/// A pending page fetch. Consumed exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontierEntry {
    /// A listing page; `page_index` starts at the seed's page number.
    List {
        url: String,
        page_index: u32,
        referer: String,
    },
    /// A job detail page discovered on a listing page.
    Detail {
        url: String,
        referer: String,
        preview: Option<PreviewFields>,
    },
}

impl FrontierEntry {
    pub fn url(&self) -> &str {
        match self {
            Self::List { url, .. } | Self::Detail { url, .. } => url,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::List { .. } => "LIST",
            Self::Detail { .. } => "DETAIL",
        }
    }

    pub fn is_detail(&self) -> bool {
        matches!(self, Self::Detail { .. })
    }
}

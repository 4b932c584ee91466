use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// Listing columns the server can sort by. `None` leaves ordering to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    #[default]
    None,
    Url,
    Domain,
    Title,
    Status,
    HtmlVersion,
    InternalLinks,
    ExternalLinks,
    InaccessibleLinks,
    H1Count,
    H2Count,
    H3Count,
    H4Count,
    H5Count,
    H6Count,
    HasLoginForm,
    CreatedAt,
    FinishedAt,
}

impl SortColumn {
    pub const ALL: [SortColumn; 18] = [
        SortColumn::None,
        SortColumn::Url,
        SortColumn::Domain,
        SortColumn::Title,
        SortColumn::Status,
        SortColumn::HtmlVersion,
        SortColumn::InternalLinks,
        SortColumn::ExternalLinks,
        SortColumn::InaccessibleLinks,
        SortColumn::H1Count,
        SortColumn::H2Count,
        SortColumn::H3Count,
        SortColumn::H4Count,
        SortColumn::H5Count,
        SortColumn::H6Count,
        SortColumn::HasLoginForm,
        SortColumn::CreatedAt,
        SortColumn::FinishedAt,
    ];

    /// Wire name sent as `sort_by`; `None` has no wire name.
    pub fn wire_name(self) -> Option<&'static str> {
        let name = match self {
            SortColumn::None => return None,
            SortColumn::Url => "url",
            SortColumn::Domain => "domain",
            SortColumn::Title => "title",
            SortColumn::Status => "status",
            SortColumn::HtmlVersion => "html_version",
            SortColumn::InternalLinks => "internal_links",
            SortColumn::ExternalLinks => "external_links",
            SortColumn::InaccessibleLinks => "inaccessible_links",
            SortColumn::H1Count => "h1_count",
            SortColumn::H2Count => "h2_count",
            SortColumn::H3Count => "h3_count",
            SortColumn::H4Count => "h4_count",
            SortColumn::H5Count => "h5_count",
            SortColumn::H6Count => "h6_count",
            SortColumn::HasLoginForm => "has_login_form",
            SortColumn::CreatedAt => "created_at",
            SortColumn::FinishedAt => "finished_at",
        };
        Some(name)
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name().unwrap_or("none"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort column `{0}`")]
pub struct UnknownSortColumn(pub String);

impl FromStr for SortColumn {
    type Err = UnknownSortColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SortColumn::ALL
            .into_iter()
            .find(|column| column.to_string().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownSortColumn(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn flipped(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the operator is currently looking at. Every transition returns a new
/// value; nothing is patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub query: String,
    pub sort_column: SortColumn,
    pub sort_order: SortOrder,
    pub page: u32,
    pub page_size: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            query: String::new(),
            sort_column: SortColumn::None,
            sort_order: SortOrder::Asc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            ..Self::default()
        }
    }

    /// Same column flips the order, another column becomes active ascending.
    pub fn sorted_by(&self, column: SortColumn) -> Self {
        let sort_order = if self.sort_column == column {
            self.sort_order.flipped()
        } else {
            SortOrder::Asc
        };
        Self {
            sort_column: column,
            sort_order,
            page: 1,
            ..self.clone()
        }
    }

    pub fn with_order(&self, sort_order: SortOrder) -> Self {
        Self {
            sort_order,
            page: if sort_order == self.sort_order {
                self.page
            } else {
                1
            },
            ..self.clone()
        }
    }

    pub fn with_query(&self, query: &str) -> Self {
        let query = query.trim();
        Self {
            query: query.to_string(),
            page: if query == self.query { self.page } else { 1 },
            ..self.clone()
        }
    }

    /// Pages are 1-based; clamping against the server total is the caller's job.
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page: page.max(1),
            ..self.clone()
        }
    }

    pub fn with_page_size_changed(&self, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        Self {
            page_size,
            page: if page_size == self.page_size {
                self.page
            } else {
                1
            },
            ..self.clone()
        }
    }
}

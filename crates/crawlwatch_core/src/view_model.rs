use crate::{CrawlResultRow, FilterState, RequestDescriptor, TargetId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub filter: FilterState,
    pub descriptor: RequestDescriptor,
    pub selected: Vec<TargetId>,
    pub total_count: Option<u64>,
    pub total_pages: Option<u32>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRowView {
    pub target_id: TargetId,
    pub url: String,
    pub domain: String,
    pub status: String,
    pub title: String,
    pub links: String,
}

impl ListingRowView {
    pub fn from_row(row: &CrawlResultRow) -> Self {
        let count = |value: Option<i32>| value.map_or_else(|| "-".to_string(), |v| v.to_string());
        Self {
            target_id: row.url_id.clone(),
            url: row.normalized_url.clone(),
            domain: row.domain.clone(),
            status: row
                .status
                .map_or_else(|| "none".to_string(), |status| status.to_string()),
            title: row.page_title.clone().unwrap_or_default(),
            links: format!(
                "{}/{}/{}",
                count(row.internal_links_count),
                count(row.external_links_count),
                count(row.inaccessible_links_count)
            ),
        }
    }
}

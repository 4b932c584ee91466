use std::fmt::Write;

use chrono::{DateTime, TimeZone};
use crawlwatch_core::{
    BatchOperationResult, ConnectionState, DashboardView, ListingPage, ListingRowView, SortColumn,
};

const ID_WIDTH: usize = 12;
const STATUS_WIDTH: usize = 10;
const URL_WIDTH: usize = 40;
const LINKS_WIDTH: usize = 10;
const TITLE_WIDTH: usize = 32;

pub fn connection_label(state: ConnectionState) -> &'static str {
    if state.is_connected() {
        "Live"
    } else {
        "Offline"
    }
}

/// Plain-text listing: one header line, a column header, one line per row.
pub fn render_listing<Tz>(
    view: &DashboardView,
    page: &ListingPage,
    connection: Option<ConnectionState>,
    at: &DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    let total_pages = view.total_pages.unwrap_or_else(|| page.total_pages()).max(1);
    let _ = write!(
        out,
        "page {}/{} | {} targets",
        view.filter.page,
        total_pages,
        view.total_count.unwrap_or(page.total_count)
    );
    if view.filter.sort_column != SortColumn::None {
        let _ = write!(
            out,
            " | sort: {} {}",
            view.filter.sort_column, view.filter.sort_order
        );
    }
    if !view.filter.query.is_empty() {
        let _ = write!(out, " | query: {:?}", view.filter.query);
    }
    if let Some(state) = connection {
        let _ = write!(out, " | {}", connection_label(state));
    }
    let _ = writeln!(out, " | {}", at.format("%H:%M:%S"));

    if page.urls.is_empty() {
        out.push_str("No targets match.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<ID_WIDTH$} {:<STATUS_WIDTH$} {:<URL_WIDTH$} {:<LINKS_WIDTH$} TITLE",
        "ID", "STATUS", "URL", "LINKS i/e/x"
    );
    for row in &page.urls {
        let row = ListingRowView::from_row(row);
        let _ = writeln!(
            out,
            "{:<ID_WIDTH$} {:<STATUS_WIDTH$} {:<URL_WIDTH$} {:<LINKS_WIDTH$} {}",
            truncate(row.target_id.as_str(), ID_WIDTH),
            row.status,
            truncate(&row.url, URL_WIDTH),
            row.links,
            truncate(&row.title, TITLE_WIDTH)
        );
    }
    out
}

pub fn render_batch(result: &BatchOperationResult) -> String {
    let mut out = result.message();
    out.push('\n');
    for failure in &result.errors {
        let _ = writeln!(out, "  {}", failure.error);
    }
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

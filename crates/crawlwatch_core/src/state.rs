use crate::view_model::DashboardView;
use crate::{total_pages, FilterState, ListingPage, RequestDescriptor, TargetId};

/// What the last loaded listing told us about the result set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingSummary {
    pub total_count: u64,
    pub total_pages: u32,
    pub visible: Vec<TargetId>,
}

impl ListingSummary {
    pub fn from_page(page: &ListingPage) -> Self {
        Self {
            total_count: page.total_count,
            total_pages: total_pages(page.total_count, page.limit),
            visible: page.urls.iter().map(|row| row.url_id.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DashboardState {
    filter: FilterState,
    selection: Vec<TargetId>,
    listing: Option<ListingSummary>,
    dirty: bool,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: FilterState) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn descriptor(&self) -> RequestDescriptor {
        RequestDescriptor::from_filter(&self.filter)
    }

    pub fn selection(&self) -> &[TargetId] {
        &self.selection
    }

    pub fn listing(&self) -> Option<&ListingSummary> {
        self.listing.as_ref()
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            filter: self.filter.clone(),
            descriptor: self.descriptor(),
            selected: self.selection.clone(),
            total_count: self.listing.as_ref().map(|l| l.total_count),
            total_pages: self.listing.as_ref().map(|l| l.total_pages),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Replaces the filter; returns whether the derived request changed.
    pub(crate) fn replace_filter(&mut self, next: FilterState) -> bool {
        if next == self.filter {
            return false;
        }
        let before = self.descriptor();
        self.filter = next;
        self.dirty = true;
        self.descriptor() != before
    }

    /// Clamps a requested page into the known page range, if there is one.
    pub(crate) fn clamp_page(&self, page: u32) -> u32 {
        match self.listing.as_ref().map(|l| l.total_pages) {
            Some(total) if total > 0 => page.clamp(1, total),
            _ => page.max(1),
        }
    }

    pub(crate) fn toggle_selection(&mut self, target_id: TargetId) {
        if let Some(pos) = self.selection.iter().position(|id| *id == target_id) {
            self.selection.remove(pos);
        } else {
            self.selection.push(target_id);
        }
        self.dirty = true;
    }

    pub(crate) fn select_visible(&mut self) {
        let visible = self
            .listing
            .as_ref()
            .map(|l| l.visible.clone())
            .unwrap_or_default();
        if self.selection != visible {
            self.selection = visible;
            self.dirty = true;
        }
    }

    pub(crate) fn take_selection(&mut self) -> Vec<TargetId> {
        let taken = std::mem::take(&mut self.selection);
        if !taken.is_empty() {
            self.dirty = true;
        }
        taken
    }

    pub(crate) fn set_listing(&mut self, summary: ListingSummary) {
        if self.listing.as_ref() != Some(&summary) {
            self.listing = Some(summary);
            self.dirty = true;
        }
    }
}

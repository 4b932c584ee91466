use std::sync::Once;

use crawlwatch_core::{
    update, DashboardState, Effect, FilterState, ListingSummary, Msg, RequestDescriptor,
    SortColumn, SortOrder,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(crawlwatch_logging::initialize_for_tests);
}

fn on_page(page: u32) -> DashboardState {
    DashboardState::with_filter(FilterState::new().with_page(page))
}

fn loaded(total_count: u64, total_pages: u32) -> Msg {
    Msg::ListingLoaded(ListingSummary {
        total_count,
        total_pages,
        visible: Vec::new(),
    })
}

#[test]
fn sort_toggles_and_resets_page() {
    init_logging();
    let state = on_page(3);
    assert_eq!(state.filter().sort_column, SortColumn::None);

    let (state, effects) = update(state, Msg::SortClicked(SortColumn::Status));
    assert_eq!(state.filter().sort_column, SortColumn::Status);
    assert_eq!(state.filter().sort_order, SortOrder::Asc);
    assert_eq!(state.filter().page, 1);
    assert_eq!(effects, vec![Effect::LoadListing(state.descriptor())]);

    let (state, _) = update(state, Msg::PageChanged(4));
    let (state, effects) = update(state, Msg::SortClicked(SortColumn::Status));
    assert_eq!(state.filter().sort_column, SortColumn::Status);
    assert_eq!(state.filter().sort_order, SortOrder::Desc);
    assert_eq!(state.filter().page, 1);
    assert_eq!(effects.len(), 1);

    let (state, _) = update(state, Msg::PageChanged(2));
    let (state, effects) = update(state, Msg::SortClicked(SortColumn::Domain));
    assert_eq!(state.filter().sort_column, SortColumn::Domain);
    assert_eq!(state.filter().sort_order, SortOrder::Asc);
    assert_eq!(state.filter().page, 1);
    assert_eq!(effects.len(), 1);
}

#[test]
fn search_resets_page_and_emits_descriptor() {
    init_logging();
    let (mut state, effects) = update(on_page(4), Msg::SearchSubmitted("  example ".into()));

    assert_eq!(state.filter().query, "example");
    assert_eq!(state.filter().page, 1);
    assert!(state.consume_dirty());
    let expected = RequestDescriptor {
        query: Some("example".into()),
        sort: None,
        page: 1,
        limit: 5,
    };
    assert_eq!(effects, vec![Effect::LoadListing(expected)]);
}

#[test]
fn resubmitting_same_search_keeps_page_and_emits_nothing() {
    init_logging();
    let (state, _) = update(DashboardState::new(), Msg::SearchSubmitted("abc".into()));
    let (mut state, _) = update(state, Msg::PageChanged(2));
    assert!(state.consume_dirty());

    let (mut state, effects) = update(state, Msg::SearchSubmitted("abc".into()));
    assert_eq!(state.filter().page, 2);
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
}

#[test]
fn page_change_keeps_query_and_sort() {
    init_logging();
    let (state, _) = update(DashboardState::new(), Msg::SearchSubmitted("shop".into()));
    let (state, _) = update(state, Msg::SortClicked(SortColumn::CreatedAt));
    let (state, effects) = update(state, Msg::PageChanged(3));

    assert_eq!(state.filter().query, "shop");
    assert_eq!(state.filter().sort_column, SortColumn::CreatedAt);
    assert_eq!(state.filter().page, 3);
    assert_eq!(effects, vec![Effect::LoadListing(state.descriptor())]);
}

#[test]
fn page_change_is_clamped_to_known_total() {
    init_logging();
    let (state, _) = update(DashboardState::new(), loaded(47, 10));

    let (state, _) = update(state, Msg::PageChanged(25));
    assert_eq!(state.filter().page, 10);

    let (state, _) = update(state, Msg::PageChanged(0));
    assert_eq!(state.filter().page, 1);
}

#[test]
fn page_change_without_listing_is_not_clamped_above() {
    init_logging();
    let (state, _) = update(DashboardState::new(), Msg::PageChanged(12));
    assert_eq!(state.filter().page, 12);
}

#[test]
fn shrinking_listing_moves_back_to_last_page() {
    init_logging();
    let (state, effects) = update(on_page(5), loaded(12, 3));
    assert_eq!(state.filter().page, 3);
    assert_eq!(effects, vec![Effect::LoadListing(state.descriptor())]);

    let (state, effects) = update(state, loaded(12, 3));
    assert!(effects.is_empty());
    assert_eq!(state.filter().page, 3);
}

#[test]
fn listing_on_valid_page_emits_nothing() {
    init_logging();
    let (state, effects) = update(on_page(2), loaded(12, 3));
    assert_eq!(state.filter().page, 2);
    assert!(effects.is_empty());
}

#[test]
fn page_size_change_resets_page() {
    init_logging();
    let (state, effects) = update(on_page(3), Msg::PageSizeChanged(20));
    assert_eq!(state.filter().page_size, 20);
    assert_eq!(state.filter().page, 1);
    assert_eq!(effects.len(), 1);

    let (state, effects) = update(state, Msg::PageSizeChanged(20));
    assert_eq!(state.filter().page_size, 20);
    assert!(effects.is_empty());
}

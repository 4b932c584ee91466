use crate::{DashboardState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: DashboardState, msg: Msg) -> (DashboardState, Vec<Effect>) {
    let effects = match msg {
        Msg::SearchSubmitted(query) => {
            let next = state.filter().with_query(&query);
            reload_if_changed(&mut state, next)
        }
        Msg::SortClicked(column) => {
            let next = state.filter().sorted_by(column);
            reload_if_changed(&mut state, next)
        }
        Msg::PageChanged(page) => {
            let page = state.clamp_page(page);
            let next = state.filter().with_page(page);
            reload_if_changed(&mut state, next)
        }
        Msg::PageSizeChanged(page_size) => {
            let next = state.filter().with_page_size_changed(page_size);
            reload_if_changed(&mut state, next)
        }
        Msg::TargetToggled(target_id) => {
            state.toggle_selection(target_id);
            Vec::new()
        }
        Msg::SelectAllToggled(true) => {
            state.select_visible();
            Vec::new()
        }
        Msg::SelectAllToggled(false) => {
            state.take_selection();
            Vec::new()
        }
        Msg::BatchRequested(action) => {
            let targets = state.take_selection();
            if targets.is_empty() {
                Vec::new()
            } else {
                vec![Effect::RunBatch { action, targets }]
            }
        }
        Msg::ListingLoaded(summary) => {
            state.set_listing(summary);
            // The result set shrank under us (deletes, new filter on the server):
            // fall back to the last page that exists.
            let clamped = state.clamp_page(state.filter().page);
            if clamped != state.filter().page {
                let next = state.filter().with_page(clamped);
                reload_if_changed(&mut state, next)
            } else {
                Vec::new()
            }
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn reload_if_changed(state: &mut DashboardState, next: crate::FilterState) -> Vec<Effect> {
    if state.replace_filter(next) {
        vec![Effect::LoadListing(state.descriptor())]
    } else {
        Vec::new()
    }
}

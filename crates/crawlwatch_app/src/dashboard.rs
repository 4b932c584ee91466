use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Local;
use crawlwatch_core::{
    update, BatchOperationResult, ConnectionState, DashboardState, Effect, FilterState,
    ListingPage, ListingSummary, Msg,
};
use crawlwatch_engine::{ApiError, SyncEngine};
use crawlwatch_logging::{cw_debug, cw_info};

use crate::render;

/// Runs dashboard messages through `update` and executes the effects on the
/// engine, feeding results back in as messages.
pub struct Dashboard {
    engine: SyncEngine,
    state: DashboardState,
    page: Option<Arc<ListingPage>>,
}

impl Dashboard {
    pub fn new(engine: SyncEngine, filter: FilterState) -> Self {
        Self {
            engine,
            state: DashboardState::with_filter(filter),
            page: None,
        }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Reads the current page through the cache. A stale page is refetched.
    pub async fn reload(&mut self) -> Result<(), ApiError> {
        let load = Effect::LoadListing(self.state.descriptor());
        let mut reports = Vec::new();
        if let Some(follow_up) = self.run_effect(load, &mut reports).await? {
            self.dispatch(follow_up).await?;
        }
        Ok(())
    }

    pub async fn dispatch(&mut self, msg: Msg) -> Result<Vec<BatchOperationResult>, ApiError> {
        let mut inbox = VecDeque::from([msg]);
        let mut reports = Vec::new();
        while let Some(msg) = inbox.pop_front() {
            cw_debug!("dashboard <- {:?}", msg);
            let state = std::mem::take(&mut self.state);
            let (state, effects) = update(state, msg);
            self.state = state;
            for effect in effects {
                if let Some(follow_up) = self.run_effect(effect, &mut reports).await? {
                    inbox.push_back(follow_up);
                }
            }
        }
        Ok(reports)
    }

    async fn run_effect(
        &mut self,
        effect: Effect,
        reports: &mut Vec<BatchOperationResult>,
    ) -> Result<Option<Msg>, ApiError> {
        match effect {
            Effect::LoadListing(descriptor) => {
                let page = self.engine.listing(&descriptor).await?;
                let summary = ListingSummary::from_page(&page);
                self.page = Some(page);
                Ok(Some(Msg::ListingLoaded(summary)))
            }
            Effect::RunBatch { action, targets } => {
                let result = self.engine.run_batch(action, &targets).await;
                cw_info!("{}", result.message());
                reports.push(result);
                Ok(None)
            }
        }
    }

    /// Text for the last loaded page, or nothing before the first load.
    pub fn render(&mut self, connection: Option<ConnectionState>) -> Option<String> {
        self.state.consume_dirty();
        let page = self.page.as_ref()?;
        Some(render::render_listing(
            &self.state.view(),
            page,
            connection,
            &Local::now(),
        ))
    }
}

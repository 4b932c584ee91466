use std::sync::Arc;

use crawlwatch_core::{BatchAction, BatchOperationResult, InvalidationPlan, TargetId};
use crawlwatch_logging::{cw_debug, cw_info, cw_warn};
use futures_util::{stream, StreamExt};

use crate::{ApiError, DashboardApi, InvalidationSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    /// Upper bound on requests in flight at once. 1 dispatches strictly in order.
    pub max_in_flight: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { max_in_flight: 1 }
    }
}

/// Applies one action to a selection of targets, one request per target.
pub struct BatchCoordinator {
    api: Arc<dyn DashboardApi>,
    sink: Arc<dyn InvalidationSink>,
    settings: BatchSettings,
}

impl BatchCoordinator {
    pub fn new(
        api: Arc<dyn DashboardApi>,
        sink: Arc<dyn InvalidationSink>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            api,
            sink,
            settings,
        }
    }

    /// Runs `action` for every id, in input order, and always returns a
    /// summary. Failures for one target never stop the others. Duplicate ids
    /// are dispatched once per occurrence.
    pub async fn run(&self, action: BatchAction, targets: &[TargetId]) -> BatchOperationResult {
        let mut result = BatchOperationResult::new(action);
        if targets.is_empty() {
            cw_debug!("batch {} with no targets", action);
            return result;
        }

        cw_info!("batch {} for {} targets", action, targets.len());
        let outcomes: Vec<(&TargetId, Result<(), ApiError>)> = stream::iter(targets)
            .map(|target_id| async move { (target_id, self.dispatch(action, target_id).await) })
            .buffered(self.settings.max_in_flight.max(1))
            .collect()
            .await;

        for (target_id, outcome) in outcomes {
            if let Err(err) = &outcome {
                cw_warn!("batch {} failed for {}: {}", action, target_id, err);
            }
            result.record(target_id, outcome);
        }

        // Partial success still changes server state.
        self.sink.invalidate(&InvalidationPlan::for_targets(targets));
        cw_info!("{}", result.message());
        result
    }

    async fn dispatch(&self, action: BatchAction, target_id: &TargetId) -> Result<(), ApiError> {
        match action {
            BatchAction::Start => self.api.start_crawl(target_id).await,
            BatchAction::Stop => self.api.stop_crawl(target_id).await,
            BatchAction::Delete => self.api.delete_target(target_id).await,
        }
    }
}

use std::sync::Arc;

use crawlwatch_core::{normalize_target_url, InvalidTargetUrl, InvalidationPlan, TargetId};
use crawlwatch_logging::{cw_info, cw_warn};

use crate::{ApiError, DashboardApi, InvalidationSink};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    InvalidUrl(#[from] InvalidTargetUrl),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Single-target mutations. Each successful call invalidates what it touched.
#[derive(Clone)]
pub struct TargetCommands {
    api: Arc<dyn DashboardApi>,
    sink: Arc<dyn InvalidationSink>,
}

impl TargetCommands {
    pub fn new(api: Arc<dyn DashboardApi>, sink: Arc<dyn InvalidationSink>) -> Self {
        Self { api, sink }
    }

    /// Registers a new target and returns the normalized address that was sent.
    pub async fn create_target(&self, raw_url: &str) -> Result<String, CommandError> {
        let normalized = normalize_target_url(raw_url)?;
        self.api
            .create_target(&normalized)
            .await
            .inspect_err(|err| cw_warn!("adding {} failed: {}", normalized, err))?;
        cw_info!("added target {}", normalized);
        self.sink.invalidate(&InvalidationPlan::AllListings);
        Ok(normalized)
    }

    pub async fn delete_target(&self, target_id: &TargetId) -> Result<(), CommandError> {
        self.api.delete_target(target_id).await?;
        cw_info!("deleted target {}", target_id);
        self.invalidate_target(target_id);
        Ok(())
    }

    pub async fn start_crawl(&self, target_id: &TargetId) -> Result<(), CommandError> {
        self.api.start_crawl(target_id).await?;
        cw_info!("started crawl for {}", target_id);
        self.invalidate_target(target_id);
        Ok(())
    }

    pub async fn stop_crawl(&self, target_id: &TargetId) -> Result<(), CommandError> {
        self.api.stop_crawl(target_id).await?;
        cw_info!("stopped crawl for {}", target_id);
        self.invalidate_target(target_id);
        Ok(())
    }

    fn invalidate_target(&self, target_id: &TargetId) {
        self.sink
            .invalidate(&InvalidationPlan::Targets(vec![target_id.clone()]));
    }
}

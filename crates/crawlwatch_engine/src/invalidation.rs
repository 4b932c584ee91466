use crawlwatch_core::{InvalidationPlan, Notification};
use crawlwatch_logging::{cw_debug, cw_trace};

use crate::QueryCache;

/// Receives invalidation plans from the push channel, batch runs and single
/// target commands.
pub trait InvalidationSink: Send + Sync {
    /// Returns how many cached entries the plan covered.
    fn invalidate(&self, plan: &InvalidationPlan) -> usize;
}

/// Applies invalidation plans to a [`QueryCache`].
pub struct InvalidationCoordinator<V> {
    cache: QueryCache<V>,
}

impl<V> InvalidationCoordinator<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(cache: QueryCache<V>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &QueryCache<V> {
        &self.cache
    }

    pub fn on_notification(&self, notification: &Notification) -> usize {
        self.invalidate(&InvalidationPlan::for_notification(notification))
    }
}

impl<V> InvalidationSink for InvalidationCoordinator<V>
where
    V: Send + Sync + 'static,
{
    fn invalidate(&self, plan: &InvalidationPlan) -> usize {
        if plan.is_empty() {
            cw_trace!("nothing to invalidate");
            return 0;
        }
        let marked = self.cache.mark_stale_where(|key| plan.covers(key));
        cw_debug!("invalidated {} cache entries for {:?}", marked, plan);
        marked
    }
}

use std::sync::Arc;

use crawlwatch_core::{
    BatchAction, BatchOperationResult, CacheKey, ConnectionState, ListingPage, ReconnectPolicy,
    RequestDescriptor, TargetId,
};
use crawlwatch_logging::cw_info;
use tokio::sync::broadcast;

use crate::cache::CacheSnapshot;
use crate::{
    ApiError, BatchCoordinator, BatchSettings, ClientSettings, DashboardApi, EventStreamClient,
    InvalidationCoordinator, InvalidationSink, QueryCache, ReqwestDashboardClient,
    ReqwestStreamTransport, SessionContext, StreamEvent, StreamTransport, TargetCommands,
};

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub client: ClientSettings,
    pub reconnect: ReconnectPolicy,
    pub batch: BatchSettings,
}

/// Wires the cache, push channel, batch runner and commands around one
/// session. Listing reads are lazy: invalidation only marks entries stale and
/// the next read refetches.
pub struct SyncEngine {
    session: SessionContext,
    api: Arc<dyn DashboardApi>,
    cache: QueryCache<ListingPage>,
    stream: EventStreamClient,
    batch: BatchCoordinator,
    commands: TargetCommands,
}

impl SyncEngine {
    pub fn new(config: EngineConfig, session: SessionContext) -> Result<Self, ApiError> {
        let api = Arc::new(ReqwestDashboardClient::new(&config.client, session.clone())?);
        let transport = Arc::new(ReqwestStreamTransport::new(&config.client, session.clone())?);
        Ok(Self::with_parts(config, session, api, transport))
    }

    /// Builds an engine over caller-supplied backends.
    pub fn with_parts(
        config: EngineConfig,
        session: SessionContext,
        api: Arc<dyn DashboardApi>,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        let cache = QueryCache::new();
        let sink: Arc<dyn InvalidationSink> =
            Arc::new(InvalidationCoordinator::new(cache.clone()));
        Self {
            stream: EventStreamClient::new(transport, Arc::clone(&sink), config.reconnect),
            batch: BatchCoordinator::new(Arc::clone(&api), Arc::clone(&sink), config.batch),
            commands: TargetCommands::new(Arc::clone(&api), sink),
            session,
            api,
            cache,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn cache(&self) -> &QueryCache<ListingPage> {
        &self.cache
    }

    pub fn commands(&self) -> &TargetCommands {
        &self.commands
    }

    /// Reads a listing page, from cache when fresh.
    pub async fn listing(&self, descriptor: &RequestDescriptor) -> Result<Arc<ListingPage>, ApiError> {
        let api = Arc::clone(&self.api);
        let request = descriptor.clone();
        self.cache
            .get_or_fetch(descriptor.cache_key(), move || async move {
                api.list_targets(&request).await
            })
            .await
    }

    /// Refetches a listing page even when the cached copy is fresh.
    pub async fn refresh_listing(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<Arc<ListingPage>, ApiError> {
        let api = Arc::clone(&self.api);
        let request = descriptor.clone();
        self.cache
            .refresh(descriptor.cache_key(), move || async move {
                api.list_targets(&request).await
            })
            .await
    }

    pub fn listing_snapshot(&self, descriptor: &RequestDescriptor) -> Option<CacheSnapshot<ListingPage>> {
        self.cache.snapshot(&descriptor.cache_key())
    }

    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.cache.is_stale(key)
    }

    pub fn start_live_updates(&self) -> bool {
        self.stream.start()
    }

    pub fn stop_live_updates(&self) {
        self.stream.stop();
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.stream.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.stream.subscribe()
    }

    pub async fn run_batch(&self, action: BatchAction, targets: &[TargetId]) -> BatchOperationResult {
        self.batch.run(action, targets).await
    }

    /// Stops the push channel, forgets every cached read and drops the token.
    pub fn end_session(&self) {
        self.stream.stop();
        self.cache.clear();
        self.session.clear();
        cw_info!("session ended");
    }
}

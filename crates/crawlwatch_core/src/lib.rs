//! Crawlwatch core: pure dashboard state, request derivation and the
//! synchronization rules shared by the engine. Nothing in here does IO.
mod batch;
mod channel;
mod descriptor;
mod effect;
mod filter;
mod invalidation;
mod model;
mod msg;
mod notification;
mod state;
mod target_url;
mod update;
mod view_model;

pub use batch::{BatchAction, BatchFailure, BatchOperationResult, UnknownBatchAction};
pub use channel::{
    ChannelAction, ChannelEvent, ChannelMachine, ConnectionState, ReconnectPolicy,
    DEFAULT_RECONNECT_DELAY,
};
pub use descriptor::{CacheKey, RequestDescriptor};
pub use effect::Effect;
pub use filter::{FilterState, SortColumn, SortOrder, UnknownSortColumn, DEFAULT_PAGE_SIZE};
pub use invalidation::InvalidationPlan;
pub use model::{
    total_pages, CrawlJob, CrawlMetrics, CrawlResultRow, CrawlStatus, CrawlTarget, HeadingCounts,
    ListingPage, TargetId, DEFAULT_RESPONSE_LIMIT,
};
pub use msg::Msg;
pub use notification::{MalformedMessage, Notification, NotificationKind};
pub use state::{DashboardState, ListingSummary};
pub use target_url::{normalize_target_url, InvalidTargetUrl};
pub use update::update;
pub use view_model::{DashboardView, ListingRowView};

//! Crawlwatch engine: backend IO, caching and the live push channel.
mod batch;
mod cache;
mod client;
mod commands;
mod engine;
mod invalidation;
mod session;
mod sse;
mod stream;
mod types;

pub use batch::{BatchCoordinator, BatchSettings};
pub use cache::{CacheSnapshot, QueryCache};
pub use client::{ClientSettings, DashboardApi, ReqwestDashboardClient, DEFAULT_API_BASE_URL};
pub use commands::{CommandError, TargetCommands};
pub use engine::{EngineConfig, SyncEngine};
pub use invalidation::{InvalidationCoordinator, InvalidationSink};
pub use session::{AuthStatus, SessionContext};
pub use sse::SseDecoder;
pub use stream::{EventStreamClient, FrameStream, ReqwestStreamTransport, StreamEvent, StreamTransport};
pub use types::{ApiError, FailureKind};

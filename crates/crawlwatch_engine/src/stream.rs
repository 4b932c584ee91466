//! Push channel driver.
//!
//! Owns one long-lived server-sent-events connection per client. All
//! lifecycle decisions come from [`ChannelMachine`]; this module only performs
//! the IO the machine asks for and feeds the outcome back in.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use crawlwatch_core::{
    ChannelAction, ChannelEvent, ChannelMachine, ConnectionState, InvalidationPlan, Notification,
    NotificationKind, ReconnectPolicy,
};
use crawlwatch_logging::{cw_debug, cw_error, cw_info, cw_trace, cw_warn};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::Url;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{check_status, endpoint, parse_base_url};
use crate::types::map_reqwest_error;
use crate::{ApiError, ClientSettings, FailureKind, InvalidationSink, SessionContext, SseDecoder};

const EVENT_BUFFER: usize = 64;
const STREAM_PATH: &str = "crawl/stream";

pub type FrameStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// Opens the raw byte stream of the push channel.
#[async_trait::async_trait]
pub trait StreamTransport: Send + Sync {
    /// An `Unauthorized` error stops the client instead of scheduling a retry.
    async fn connect(&self) -> Result<FrameStream, ApiError>;
}

pub struct ReqwestStreamTransport {
    url: Url,
    http: reqwest::Client,
    session: SessionContext,
}

impl ReqwestStreamTransport {
    pub fn new(settings: &ClientSettings, session: SessionContext) -> Result<Self, ApiError> {
        let url = endpoint(&parse_base_url(&settings.base_url)?, STREAM_PATH)?;
        // No total timeout: the response body stays open for the whole session.
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { url, http, session })
    }
}

#[async_trait::async_trait]
impl StreamTransport for ReqwestStreamTransport {
    async fn connect(&self) -> Result<FrameStream, ApiError> {
        cw_debug!("opening push channel {}", self.url);
        let request = self
            .session
            .authorize(self.http.get(self.url.clone()))
            .header(reqwest::header::ACCEPT, "text/event-stream");
        let response = request.send().await.map_err(map_reqwest_error)?;
        let response = check_status(response, "GET /crawl/stream", &self.session).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error))
            .boxed())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    StateChanged(ConnectionState),
    Notification(Notification),
}

/// Keeps the push channel connected and turns its messages into cache
/// invalidations.
///
/// `start` and `stop` are idempotent. Dropping the client stops it.
pub struct EventStreamClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn StreamTransport>,
    sink: Arc<dyn InvalidationSink>,
    policy: ReconnectPolicy,
    control: Mutex<Control>,
    events: broadcast::Sender<StreamEvent>,
}

#[derive(Default)]
struct Control {
    machine: ChannelMachine,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

enum Step {
    Superseded,
    Proceed,
    Reconnect(u32),
    Close,
}

impl EventStreamClient {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        sink: Arc<dyn InvalidationSink>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(Inner {
                transport,
                sink,
                policy,
                control: Mutex::new(Control::default()),
                events,
            }),
        }
    }

    /// Begins connecting. Returns false when a connection is already open,
    /// pending or waiting to retry, or when called outside a Tokio runtime.
    pub fn start(&self) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            cw_error!("push channel can only start inside a Tokio runtime");
            return false;
        };
        let mut control = self.inner.lock_control();
        let before = control.machine.state();
        if control.machine.handle(ChannelEvent::StartRequested)
            != Some(ChannelAction::OpenConnection)
        {
            cw_debug!("push channel already {:?}", before);
            return false;
        }
        let epoch = control.machine.epoch();
        let cancel = CancellationToken::new();
        control.task = Some(runtime.spawn(run(
            Arc::clone(&self.inner),
            epoch,
            cancel.clone(),
        )));
        control.cancel = Some(cancel);
        self.inner
            .publish_state(before, control.machine.state());
        true
    }

    pub fn stop(&self) {
        let mut control = self.inner.lock_control();
        let before = control.machine.state();
        let action = control.machine.handle(ChannelEvent::StopRequested);
        if let Some(cancel) = control.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = control.task.take() {
            task.abort();
        }
        if action.is_some() {
            cw_info!("push channel stopped");
            self.inner
                .publish_state(before, control.machine.state());
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock_control().machine.state()
    }

    /// Consecutive failed attempts since the channel was last open.
    pub fn failures(&self) -> u32 {
        self.inner.lock_control().machine.failures()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.inner.events.subscribe()
    }
}

impl Drop for EventStreamClient {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, epoch: u64) -> bool {
        let control = self.lock_control();
        control.machine.epoch() == epoch && control.machine.state() != ConnectionState::Disconnected
    }

    /// Feeds `event` to the machine unless `epoch` has been stopped or replaced.
    fn apply(&self, epoch: u64, event: ChannelEvent) -> Step {
        let mut control = self.lock_control();
        if control.machine.epoch() != epoch
            || control.machine.state() == ConnectionState::Disconnected
        {
            cw_trace!("ignoring {:?} from finished run #{}", event, epoch);
            return Step::Superseded;
        }
        let before = control.machine.state();
        let action = control.machine.handle(event);
        self.publish_state(before, control.machine.state());
        match action {
            None | Some(ChannelAction::OpenConnection) => Step::Proceed,
            Some(ChannelAction::ScheduleReconnect { attempt }) => Step::Reconnect(attempt),
            Some(ChannelAction::CloseConnection) => Step::Close,
        }
    }

    fn publish_state(&self, before: ConnectionState, after: ConnectionState) {
        if before == after {
            return;
        }
        cw_info!("push channel {:?} -> {:?}", before, after);
        let _ = self.events.send(StreamEvent::StateChanged(after));
    }

    fn dispatch(&self, payload: &str) {
        let notification = match Notification::parse(payload) {
            Ok(notification) => notification,
            Err(err) => {
                cw_warn!("dropping push message: {}", err);
                return;
            }
        };
        match &notification.kind {
            NotificationKind::Unknown(kind) => cw_info!("ignoring push message of type {}", kind),
            kind => cw_trace!("push message {:?}", kind),
        }
        let plan = InvalidationPlan::for_notification(&notification);
        if !plan.is_empty() {
            self.sink.invalidate(&plan);
        }
        let _ = self.events.send(StreamEvent::Notification(notification));
    }
}

async fn run(inner: Arc<Inner>, epoch: u64, cancel: CancellationToken) {
    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            connected = inner.transport.connect() => connected,
        };

        let step = match connected {
            Ok(frames) => match inner.apply(epoch, ChannelEvent::Opened) {
                Step::Proceed => {
                    read_frames(&inner, epoch, frames, &cancel).await;
                    if cancel.is_cancelled() {
                        return;
                    }
                    inner.apply(epoch, ChannelEvent::TransportFailed)
                }
                _ => return,
            },
            Err(err) if err.is_auth_expired() => {
                cw_warn!("push channel rejected credentials; not retrying");
                inner.apply(epoch, ChannelEvent::AuthRejected)
            }
            Err(err) => {
                cw_warn!("push channel connect failed: {}", err);
                inner.apply(epoch, ChannelEvent::TransportFailed)
            }
        };

        let Step::Reconnect(attempt) = step else {
            return;
        };
        let delay = inner.policy.delay_for(attempt);
        cw_info!("reconnecting push channel in {:?} (attempt {})", delay, attempt);
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        if !matches!(inner.apply(epoch, ChannelEvent::RetryElapsed), Step::Proceed) {
            return;
        }
    }
}

async fn read_frames(inner: &Inner, epoch: u64, mut frames: FrameStream, cancel: &CancellationToken) {
    let mut decoder = SseDecoder::new();
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = frames.next() => frame,
        };
        match frame {
            Some(Ok(bytes)) => {
                for payload in decoder.feed(&bytes) {
                    if !inner.is_current(epoch) {
                        return;
                    }
                    inner.dispatch(&payload);
                }
            }
            Some(Err(err)) => {
                cw_warn!("push channel read failed: {}", err);
                return;
            }
            None => {
                if let Some(payload) = decoder.finish() {
                    if !inner.is_current(epoch) {
                        return;
                    }
                    inner.dispatch(&payload);
                }
                cw_info!("push channel closed by server");
                return;
            }
        }
    }
}

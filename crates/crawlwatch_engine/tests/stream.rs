use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use crawlwatch_core::{ConnectionState, InvalidationPlan, NotificationKind, ReconnectPolicy, TargetId};
use crawlwatch_engine::{
    ApiError, AuthStatus, ClientSettings, EventStreamClient, FailureKind, FrameStream,
    InvalidationSink, ReqwestStreamTransport, SessionContext, SseDecoder, StreamEvent,
    StreamTransport,
};
use futures_util::{stream, StreamExt};
use pretty_assertions::assert_eq;
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

enum Attempt {
    Fail(FailureKind),
    /// Delivers the chunks, then keeps the connection open.
    Hold(Vec<&'static str>),
    /// Delivers the chunks, then the server closes the connection.
    Close(Vec<&'static str>),
    /// Like `Close`, but the close waits until the sender fires.
    CloseWhen(Vec<&'static str>, oneshot::Receiver<()>),
}

#[derive(Default)]
struct ScriptedTransport {
    script: Mutex<VecDeque<Attempt>>,
    attempts: AtomicUsize,
}

impl ScriptedTransport {
    fn new(script: Vec<Attempt>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            attempts: AtomicUsize::new(0),
        })
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

fn chunks(raw: Vec<&'static str>) -> impl futures_util::Stream<Item = Result<Bytes, ApiError>> {
    stream::iter(raw.into_iter().map(|chunk| Ok(Bytes::from_static(chunk.as_bytes()))))
}

#[async_trait::async_trait]
impl StreamTransport for ScriptedTransport {
    async fn connect(&self) -> Result<FrameStream, ApiError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Attempt::Hold(raw)) => Ok(chunks(raw).chain(stream::pending()).boxed()),
            Some(Attempt::Close(raw)) => Ok(chunks(raw).boxed()),
            Some(Attempt::CloseWhen(raw, gate)) => Ok(chunks(raw)
                .chain(stream::once(gate).filter_map(|_| async { None }))
                .boxed()),
            Some(Attempt::Fail(kind)) => Err(ApiError::new(kind, "scripted failure")),
            None => Err(ApiError::new(FailureKind::Network, "script exhausted")),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    plans: Mutex<Vec<InvalidationPlan>>,
}

impl InvalidationSink for RecordingSink {
    fn invalidate(&self, plan: &InvalidationPlan) -> usize {
        self.plans.lock().unwrap().push(plan.clone());
        1
    }
}

fn client(transport: &Arc<ScriptedTransport>, sink: &Arc<RecordingSink>) -> EventStreamClient {
    EventStreamClient::new(
        Arc::clone(transport) as Arc<dyn StreamTransport>,
        Arc::clone(sink) as Arc<dyn InvalidationSink>,
        ReconnectPolicy::Fixed(Duration::from_secs(5)),
    )
}

async fn next_event(events: &mut broadcast::Receiver<StreamEvent>) -> StreamEvent {
    tokio::time::timeout(Duration::from_secs(600), events.recv())
        .await
        .expect("event before timeout")
        .expect("channel open")
}

async fn states_until(
    events: &mut broadcast::Receiver<StreamEvent>,
    last: ConnectionState,
) -> Vec<ConnectionState> {
    let mut seen = Vec::new();
    loop {
        if let StreamEvent::StateChanged(state) = next_event(events).await {
            seen.push(state);
            if state == last {
                return seen;
            }
        }
    }
}

const CONNECTED: &str = "data: {\"type\":\"connection\",\"user_id\":\"u-1\"}\n\n";

#[tokio::test(start_paused = true)]
async fn failed_connect_retries_after_fixed_delay() {
    crawlwatch_logging::initialize_for_tests();
    let transport = ScriptedTransport::new(vec![
        Attempt::Fail(FailureKind::Network),
        Attempt::Hold(vec![CONNECTED]),
    ]);
    let sink = Arc::new(RecordingSink::default());
    let client = client(&transport, &sink);
    let mut events = client.subscribe();
    let started = Instant::now();

    assert!(client.start());
    let states = states_until(&mut events, ConnectionState::Open).await;

    assert_eq!(
        states,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Errored,
            ConnectionState::Connecting,
            ConnectionState::Open,
        ]
    );
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(transport.attempts(), 2);
    assert_eq!(client.failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn starting_twice_keeps_one_connection() {
    let transport = ScriptedTransport::new(vec![Attempt::Hold(vec![CONNECTED])]);
    let sink = Arc::new(RecordingSink::default());
    let client = client(&transport, &sink);
    let mut events = client.subscribe();

    assert!(client.start());
    assert!(!client.start());
    states_until(&mut events, ConnectionState::Open).await;
    assert!(!client.start());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.attempts(), 1);
    assert_eq!(client.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_ends_retries() {
    let transport = ScriptedTransport::new(vec![Attempt::Hold(vec![CONNECTED])]);
    let sink = Arc::new(RecordingSink::default());
    let client = client(&transport, &sink);
    let mut events = client.subscribe();

    client.start();
    states_until(&mut events, ConnectionState::Open).await;
    client.stop();
    client.stop();

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(
        states_until(&mut events, ConnectionState::Disconnected).await,
        vec![ConnectionState::Disconnected]
    );
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(events.try_recv().is_err());
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_payloads_are_skipped() {
    crawlwatch_logging::initialize_for_tests();
    let transport = ScriptedTransport::new(vec![Attempt::Hold(vec![
        CONNECTED,
        "data: {not json\n\n",
        "data: {\"type\":\"ping\"}\n\n",
        "data: {\"type\":\"crawl_update\",\"url_id\":\"t-1\"}\n\n",
    ])]);
    let sink = Arc::new(RecordingSink::default());
    let client = client(&transport, &sink);
    let mut events = client.subscribe();

    client.start();
    let mut kinds = Vec::new();
    while kinds.last() != Some(&NotificationKind::CrawlUpdate) {
        if let StreamEvent::Notification(notification) = next_event(&mut events).await {
            kinds.push(notification.kind);
        }
    }

    assert_eq!(
        kinds,
        vec![
            NotificationKind::Connection,
            NotificationKind::Ping,
            NotificationKind::CrawlUpdate,
        ]
    );
    assert_eq!(
        *sink.plans.lock().unwrap(),
        vec![InvalidationPlan::Targets(vec![TargetId::from("t-1")])]
    );
    assert_eq!(client.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn unauthorized_connect_disconnects_without_retry() {
    let transport = ScriptedTransport::new(vec![Attempt::Fail(FailureKind::Unauthorized)]);
    let sink = Arc::new(RecordingSink::default());
    let client = client(&transport, &sink);
    let mut events = client.subscribe();

    client.start();
    let states = states_until(&mut events, ConnectionState::Disconnected).await;

    assert_eq!(
        states,
        vec![ConnectionState::Connecting, ConnectionState::Disconnected]
    );
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.attempts(), 1);

    // A later start is a fresh run.
    assert!(client.start());
}

#[tokio::test(start_paused = true)]
async fn server_close_reconnects() {
    let transport = ScriptedTransport::new(vec![
        Attempt::Close(vec![CONNECTED]),
        Attempt::Hold(vec![CONNECTED]),
    ]);
    let sink = Arc::new(RecordingSink::default());
    let client = client(&transport, &sink);
    let mut events = client.subscribe();

    client.start();
    states_until(&mut events, ConnectionState::Open).await;
    let states = states_until(&mut events, ConnectionState::Open).await;

    assert_eq!(
        states,
        vec![ConnectionState::Errored, ConnectionState::Connecting, ConnectionState::Open]
    );
    assert_eq!(transport.attempts(), 2);
}

const UNTERMINATED_UPDATE: &str = "data: {\"type\":\"crawl_update\",\"target_id\":\"t-9\"}";

#[tokio::test(start_paused = true)]
async fn trailing_message_is_delivered_when_server_closes() {
    let transport = ScriptedTransport::new(vec![
        Attempt::Close(vec![CONNECTED, UNTERMINATED_UPDATE]),
        Attempt::Hold(vec![CONNECTED]),
    ]);
    let sink = Arc::new(RecordingSink::default());
    let client = client(&transport, &sink);
    let mut events = client.subscribe();

    client.start();
    loop {
        if let StreamEvent::Notification(notification) = next_event(&mut events).await {
            if notification.kind == NotificationKind::CrawlUpdate {
                break;
            }
        }
    }

    assert_eq!(
        *sink.plans.lock().unwrap(),
        vec![InvalidationPlan::Targets(vec![TargetId::from("t-9")])]
    );
}

#[tokio::test(start_paused = true)]
async fn trailing_message_after_stop_is_ignored() {
    let (close, gate) = oneshot::channel();
    let transport = ScriptedTransport::new(vec![Attempt::CloseWhen(
        vec![CONNECTED, UNTERMINATED_UPDATE],
        gate,
    )]);
    let sink = Arc::new(RecordingSink::default());
    let client = client(&transport, &sink);
    let mut events = client.subscribe();

    client.start();
    states_until(&mut events, ConnectionState::Open).await;
    client.stop();
    let _ = close.send(());
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(sink.plans.lock().unwrap().is_empty());
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(
            event,
            StreamEvent::Notification(ref n) if n.kind == NotificationKind::CrawlUpdate
        ));
    }
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test]
async fn reqwest_transport_streams_event_frames() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/crawl/stream"))
        .and(header("accept", "text/event-stream"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!(
                    "{CONNECTED}data: {{\"type\":\"crawl_update\",\"target_id\":\"t-9\"}}\n\n"
                )),
        )
        .mount(&server)
        .await;

    let settings = ClientSettings {
        base_url: format!("{}/api/v1", server.uri()),
        ..ClientSettings::default()
    };
    let transport =
        ReqwestStreamTransport::new(&settings, SessionContext::with_token("secret")).expect("transport");
    let mut frames = transport.connect().await.expect("connected");

    let mut decoder = SseDecoder::new();
    let mut payloads = Vec::new();
    while let Some(chunk) = frames.next().await {
        payloads.extend(decoder.feed(&chunk.expect("chunk")));
    }

    assert_eq!(payloads.len(), 2);
    assert!(payloads[1].contains("t-9"));
}

#[tokio::test]
async fn reqwest_transport_reports_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/crawl/stream"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let settings = ClientSettings {
        base_url: format!("{}/api/v1", server.uri()),
        ..ClientSettings::default()
    };
    let session = SessionContext::with_token("expired");
    let transport = ReqwestStreamTransport::new(&settings, session.clone()).expect("transport");

    let err = match transport.connect().await {
        Ok(_) => panic!("401 must not open the stream"),
        Err(err) => err,
    };
    assert!(err.is_auth_expired());
    assert_eq!(session.status(), AuthStatus::Expired);
}

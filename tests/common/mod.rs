//! Shared test infrastructure
//!
//! - `ScriptedUpstream`: an in-process upstream whose events are pushed by the test
//! - `MockLiveServer`: a websocket server speaking the Gemini Live setup exchange
//! - helpers to run the relay on an ephemeral port and talk to it

// Not every test binary uses every helper
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_async, connect_async};

use interview_relay::config::ServerConfig;
use interview_relay::core::persona::StaticPersonaResolver;
use interview_relay::core::database::StoreResult;
use interview_relay::core::session::{
    ConversationTurn, MemoryStore, NewSession, PersistenceStore, SessionCompletion,
};
use interview_relay::core::tools::ToolResponse;
use interview_relay::core::upstream::{
    LiveSessionConfig, UpstreamConnector, UpstreamError, UpstreamEvent, UpstreamEvents,
    UpstreamResult, UpstreamSession, UpstreamSink,
};
use interview_relay::{routes, state::AppState};

pub type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type EventSender = mpsc::UnboundedSender<UpstreamResult<UpstreamEvent>>;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Scripted upstream
// =============================================================================

/// Records everything the relay writes upstream.
#[derive(Default)]
pub struct RecordingSink {
    pub frames: Mutex<Vec<Bytes>>,
    pub responses: Mutex<Vec<ToolResponse>>,
    pub texts: Mutex<Vec<String>>,
    pub close_calls: Mutex<usize>,
}

#[async_trait]
impl UpstreamSink for RecordingSink {
    async fn send_frame(&self, frame: Bytes) -> UpstreamResult<()> {
        self.frames.lock().push(frame);
        Ok(())
    }

    async fn send_tool_response(&self, response: ToolResponse) -> UpstreamResult<()> {
        self.responses.lock().push(response);
        Ok(())
    }

    async fn send_text(&self, text: &str) -> UpstreamResult<()> {
        self.texts.lock().push(text.to_string());
        Ok(())
    }

    async fn close(&self) -> UpstreamResult<()> {
        *self.close_calls.lock() += 1;
        Ok(())
    }
}

struct ChannelEvents(mpsc::UnboundedReceiver<UpstreamResult<UpstreamEvent>>);

#[async_trait]
impl UpstreamEvents for ChannelEvents {
    async fn next_event(&mut self) -> Option<UpstreamResult<UpstreamEvent>> {
        self.0.recv().await
    }
}

/// Upstream connector serving a single session driven by the test.
pub struct ScriptedUpstream {
    pub sink: Arc<RecordingSink>,
    pub configs: Mutex<Vec<LiveSessionConfig>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<UpstreamResult<UpstreamEvent>>>>,
    fail_connect: bool,
}

impl ScriptedUpstream {
    pub fn new() -> (Arc<Self>, EventSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let upstream = Arc::new(Self {
            sink: Arc::new(RecordingSink::default()),
            configs: Mutex::new(Vec::new()),
            events: Mutex::new(Some(rx)),
            fail_connect: false,
        });
        (upstream, tx)
    }

    /// A connector whose every connect attempt fails.
    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            sink: Arc::new(RecordingSink::default()),
            configs: Mutex::new(Vec::new()),
            events: Mutex::new(None),
            fail_connect: true,
        })
    }

    pub fn connect_count(&self) -> usize {
        self.configs.lock().len()
    }
}

#[async_trait]
impl UpstreamConnector for ScriptedUpstream {
    async fn connect(&self, session: LiveSessionConfig) -> UpstreamResult<UpstreamSession> {
        self.configs.lock().push(session);
        if self.fail_connect {
            return Err(UpstreamError::ConnectionFailed("connection refused".to_string()));
        }

        let events = self
            .events
            .lock()
            .take()
            .ok_or(UpstreamError::NotConnected)?;

        Ok(UpstreamSession {
            sink: self.sink.clone(),
            events: Box::new(ChannelEvents(events)),
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

// =============================================================================
// Slow store
// =============================================================================

/// A retaining in-memory store whose session creation takes `delay`.
pub struct SlowStore {
    pub inner: MemoryStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::retaining(),
            delay,
        })
    }
}

#[async_trait]
impl PersistenceStore for SlowStore {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn create_session(&self, session: &NewSession) -> StoreResult<String> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_session(session).await
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> StoreResult<()> {
        self.inner.append_turn(turn).await
    }

    async fn complete_session(&self, completion: &SessionCompletion) -> StoreResult<bool> {
        self.inner.complete_session(completion).await
    }

    async fn close(&self) {}
}

// =============================================================================
// Relay server helpers
// =============================================================================

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.host = "127.0.0.1".to_string();
    config.service_name = "relay-test".to_string();
    config.tools.drain_timeout_seconds = 1;
    config.database.command_timeout_seconds = 2;
    config
}

pub fn test_state(
    upstream: Arc<dyn UpstreamConnector>,
    store: Arc<dyn PersistenceStore>,
) -> Arc<AppState> {
    AppState::with_components(test_config(), upstream, Arc::new(StaticPersonaResolver), store)
}

/// Serve the relay on an ephemeral port.
pub async fn spawn_relay(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::create_app_router(state);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}

pub async fn connect_client(addr: SocketAddr) -> ClientSocket {
    let (socket, _response) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    socket
}

pub fn setup_message(school_id: Option<&str>) -> Message {
    let mut context = json!({ "user_agent": "relay-tests/1.0" });
    if let Some(school_id) = school_id {
        context["school_id"] = json!(school_id);
    }
    let setup = json!({
        "setup": {
            "run_id": "run-1",
            "user_id": "user-1",
            "context": context,
        }
    });
    Message::Text(setup.to_string().into())
}

/// Next non-control message from the relay.
pub async fn next_message(socket: &mut ClientSocket) -> Option<Message> {
    tokio::time::timeout(WAIT_TIMEOUT, async {
        while let Some(message) = socket.next().await {
            match message {
                Ok(Message::Ping(_) | Message::Pong(_)) => continue,
                Ok(message) => return Some(message),
                Err(_) => return None,
            }
        }
        None
    })
    .await
    .expect("timed out waiting for a relay message")
}

/// Close code and reason of the relay's close frame.
pub async fn expect_close(socket: &mut ClientSocket) -> (u16, String) {
    loop {
        match next_message(socket).await {
            Some(Message::Close(Some(frame))) => {
                return (u16::from(frame.code), frame.reason.as_str().to_string());
            }
            Some(Message::Close(None)) | None => panic!("connection ended without close frame"),
            Some(_) => continue,
        }
    }
}

/// Poll until `condition` holds.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(WAIT_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(WAIT_TIMEOUT, future)
        .await
        .expect("timed out")
}

// =============================================================================
// Mock Gemini Live server
// =============================================================================

/// A websocket server that acknowledges setup and then lets the test drive
/// the session.
pub struct MockLiveServer {
    pub addr: SocketAddr,
    /// Messages received from the client, setup first
    pub received: mpsc::UnboundedReceiver<Message>,
    /// Messages to send to the client
    pub outgoing: mpsc::UnboundedSender<Message>,
}

impl MockLiveServer {
    pub async fn start() -> Self {
        Self::start_with_ack(Message::Text(
            json!({ "setupComplete": {} }).to_string().into(),
        ))
        .await
    }

    /// Like `start`, answering the setup message with `ack`.
    pub async fn start_with_ack(ack: Message) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let _ = handle_live_connection(stream, ack, received_tx, outgoing_rx).await;
            }
        });

        Self {
            addr,
            received,
            outgoing,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}/live", self.addr)
    }

    pub async fn next_received(&mut self) -> Message {
        within(self.received.recv())
            .await
            .expect("mock server connection ended")
    }
}

async fn handle_live_connection(
    stream: TcpStream,
    ack: Message,
    received: mpsc::UnboundedSender<Message>,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    // Setup exchange
    if let Some(Ok(setup)) = read.next().await {
        let _ = received.send(setup);
    }
    write.send(ack).await?;

    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(message)) => {
                    let _ = received.send(message);
                }
            },
            message = outgoing.recv() => match message {
                Some(message) => {
                    let closing = matches!(message, Message::Close(_));
                    write.send(message).await?;
                    if closing {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    Ok(())
}

//! Relay WebSocket handler
//!
//! Upgrades the client connection, runs the setup handshake and hands the
//! connected session over to the relay loops.

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, header::USER_AGENT},
    response::Response,
};
use futures::{SinkExt, Stream, StreamExt};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::core::persona::{PersonaConfig, Topic, compose_instructions};
use crate::core::session::NewSession;
use crate::core::upstream::LiveSessionConfig;
use crate::state::AppState;

use super::messages::{
    CLOSE_INTERNAL_ERROR, CLOSE_PROTOCOL_ERROR, INTERNAL_ERROR_REASON, PROTOCOL_ERROR_REASON,
    RelayOutgoingMessage, SetupPayload, parse_setup,
};
use super::relay::{RelaySettings, run_relay};

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Where a connection is in its lifecycle. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingSetup,
    Configured,
    Connected,
    Streaming,
    Closed,
    Errored,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Self::AwaitingSetup => "awaiting_setup",
            Self::Configured => "configured",
            Self::Connected => "connected",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
            Self::Errored => "errored",
        };
        f.write_str(phase)
    }
}

/// Relay WebSocket handler
///
/// # Arguments
/// * `ws` - The WebSocket upgrade request from Axum
/// * `state` - Application state
/// * `peer` - Remote address, used when the setup context carries none
/// * `headers` - Request headers, used for the fallback user agent
pub async fn relay_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    debug!(%peer, "Relay WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_relay_socket(socket, state, peer, user_agent))
}

/// Wait for the first data message, skipping control frames.
async fn first_message<S, E>(receiver: &mut S) -> Option<Message>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => return None,
            Ok(message) => return Some(message),
            Err(e) => {
                warn!("Failed to read setup message: {}", e);
                return None;
            }
        }
    }
    None
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    }))
}

async fn handle_relay_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    peer: SocketAddr,
    fallback_user_agent: String,
) {
    let (mut sender, mut receiver) = socket.split();
    let mut phase = SessionPhase::AwaitingSetup;
    debug!(%peer, %phase, "Relay WebSocket connection established");

    let Some(first) = first_message(&mut receiver).await else {
        debug!(%peer, "Client left before sending setup");
        return;
    };

    let payload = match &first {
        Message::Text(text) => parse_setup(text.as_bytes()),
        Message::Binary(data) => parse_setup(data),
        _ => return,
    };

    let setup = match payload {
        Ok(setup) => setup,
        Err(e) => {
            warn!(%peer, "Rejecting connection: {}", e);
            let _ = sender
                .send(close_message(CLOSE_PROTOCOL_ERROR, PROTOCOL_ERROR_REASON))
                .await;
            return;
        }
    };

    let school_id = setup.school_id().map(str::to_string);
    let (persona, topics) = match &school_id {
        Some(id) => {
            let budget = state.config.database.persona_timeout();
            match tokio::time::timeout(budget, state.personas.resolve(id)).await {
                Ok(resolved) => resolved,
                Err(_) => {
                    warn!(
                        run_id = %setup.run_id,
                        school_id = %id,
                        "Persona lookup exceeded {:?}, using default persona",
                        budget
                    );
                    (PersonaConfig::default_persona(), Vec::new())
                }
            }
        }
        None => {
            warn!(run_id = %setup.run_id, "No school_id in setup context, using default persona");
            (PersonaConfig::default_persona(), Vec::new())
        }
    };

    let session_config = LiveSessionConfig {
        system_instruction: compose_instructions(&persona),
        tools: state.tools.declarations(),
        voice: None,
    };
    phase = SessionPhase::Configured;
    debug!(run_id = %setup.run_id, %phase, "Live session configured");

    let upstream = match state.upstream.connect(session_config).await {
        Ok(upstream) => upstream,
        Err(e) => {
            error!(
                run_id = %setup.run_id,
                upstream = state.upstream.name(),
                "Failed to connect upstream: {}",
                e
            );
            phase = SessionPhase::Errored;
            debug!(%phase, "Closing client connection");
            let _ = sender
                .send(close_message(CLOSE_INTERNAL_ERROR, INTERNAL_ERROR_REASON))
                .await;
            return;
        }
    };
    phase = SessionPhase::Connected;

    match serde_json::to_string(&RelayOutgoingMessage::ready()) {
        Ok(json) => {
            if let Err(e) = sender.send(Message::Text(json.into())).await {
                warn!("Failed to send status message: {}", e);
            }
        }
        Err(e) => error!("Failed to serialize status message: {}", e),
    }

    let greeting = persona.greeting.clone();
    let new_session = new_session(
        &setup,
        school_id.clone(),
        persona,
        topics,
        peer,
        fallback_user_agent,
    );
    let session = Arc::new(state.sessions.open(new_session));

    info!(
        target: "interview_relay::setup",
        run_id = %setup.run_id,
        user_id = %setup.user_id,
        school_id = school_id.as_deref().unwrap_or("none"),
        %phase,
        "Interview session started"
    );

    if school_id.is_some() && !greeting.trim().is_empty() {
        let kickoff = format!("Begin the interview by greeting the candidate with: \"{greeting}\"");
        if let Err(e) = upstream.sink.send_text(&kickoff).await {
            warn!(run_id = %setup.run_id, "Failed to send greeting kickoff: {}", e);
        }
    }

    phase = SessionPhase::Streaming;
    debug!(run_id = %setup.run_id, %phase, "Relaying");

    let end = run_relay(
        receiver,
        sender,
        upstream,
        Arc::clone(&state.tools),
        Arc::clone(&session),
        RelaySettings {
            max_pending_tools: state.config.tools.max_pending,
            tool_drain_timeout: state.config.tools.drain_timeout(),
        },
    )
    .await;

    phase = if end.is_error() {
        SessionPhase::Errored
    } else {
        SessionPhase::Closed
    };
    info!(
        session_id = %session,
        total_turns = session.turn_count(),
        %phase,
        "Interview session ended"
    );
}

fn new_session(
    setup: &SetupPayload,
    school_id: Option<String>,
    persona: PersonaConfig,
    topics: Vec<Topic>,
    peer: SocketAddr,
    fallback_user_agent: String,
) -> NewSession {
    let context = &setup.context;
    NewSession {
        user_id: setup.user_id.clone(),
        school_id,
        persona,
        topics,
        user_agent: context
            .user_agent
            .clone()
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or(fallback_user_agent),
        ip_address: context
            .ip_address
            .clone()
            .filter(|ip| !ip.trim().is_empty())
            .unwrap_or_else(|| peer.ip().to_string()),
        started_at: OffsetDateTime::now_utc(),
    }
}

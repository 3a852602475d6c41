//! The two relay loops and their supervisor.
//!
//! Each direction runs as its own loop. Both are polled by one supervisor:
//! whichever ends first decides how the session ends, and the other is
//! dropped on the spot.

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::messages::{CLOSE_INTERNAL_ERROR, CLOSE_NORMAL, INTERNAL_ERROR_REASON};
use crate::core::session::SessionHandle;
use crate::core::tools::{JsonMap, ToolDispatcher, ToolTaskSet};
use crate::core::upstream::{UpstreamEvent, UpstreamEvents, UpstreamSession, UpstreamSink};

/// Why the relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The client closed its side
    ClientClosed,
    /// Reading from or writing to the client failed
    ClientError,
    /// The upstream stream ended cleanly
    UpstreamEnded,
    /// The upstream failed
    UpstreamError,
    /// Stopped through the shared cancellation token
    Cancelled,
}

impl RelayEnd {
    /// Close frame to send to the client, if the client is still there.
    pub fn close_frame(&self) -> Option<CloseFrame> {
        match self {
            Self::UpstreamEnded => Some(CloseFrame {
                code: CLOSE_NORMAL,
                reason: Utf8Bytes::from_static(""),
            }),
            Self::UpstreamError | Self::ClientError => Some(CloseFrame {
                code: CLOSE_INTERNAL_ERROR,
                reason: Utf8Bytes::from_static(INTERNAL_ERROR_REASON),
            }),
            Self::ClientClosed | Self::Cancelled => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::ClientError | Self::UpstreamError)
    }
}

/// Forward client frames upstream, verbatim and in order.
pub async fn client_relay_loop<S, E>(
    mut client: S,
    upstream: Arc<dyn UpstreamSink>,
    cancel: CancellationToken,
) -> RelayEnd
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => return RelayEnd::Cancelled,
            message = client.next() => message,
        };

        let frame = match message {
            Some(Ok(Message::Binary(data))) => data,
            Some(Ok(Message::Text(text))) => Bytes::copy_from_slice(text.as_bytes()),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => {
                info!("Client closed connection");
                return RelayEnd::ClientClosed;
            }
            Some(Err(e)) => {
                warn!("Client connection error: {}", e);
                return RelayEnd::ClientError;
            }
        };

        if let Err(e) = upstream.send_frame(frame).await {
            error!("Failed to forward client frame upstream: {}", e);
            return RelayEnd::UpstreamError;
        }
    }
}

/// What the downstream loop needs besides its two ends.
#[derive(Clone)]
pub struct DownstreamContext {
    pub upstream: Arc<dyn UpstreamSink>,
    pub tools: Arc<ToolDispatcher>,
    pub tasks: ToolTaskSet,
    pub session: Arc<SessionHandle>,
}

/// Agent text collected over the events of one turn.
#[derive(Debug, Default)]
struct TurnText {
    model: String,
    transcript: String,
}

impl TurnText {
    fn push(&mut self, event: &UpstreamEvent) {
        if let Some(text) = &event.agent_text {
            self.model.push_str(text);
        }
        if let Some(text) = &event.output_transcript {
            self.transcript.push_str(text);
        }
    }

    /// Text of the finished turn; model text wins over the transcription.
    fn take(&mut self) -> Option<(String, &'static str)> {
        let model = std::mem::take(&mut self.model);
        let transcript = std::mem::take(&mut self.transcript);

        if !model.trim().is_empty() {
            Some((model, "model_turn"))
        } else if !transcript.trim().is_empty() {
            Some((transcript, "output_transcription"))
        } else {
            None
        }
    }
}

/// Forward upstream events to the client and trigger their side effects.
pub async fn downstream_relay_loop<W>(
    events: &mut dyn UpstreamEvents,
    client: &mut W,
    ctx: &DownstreamContext,
    cancel: CancellationToken,
) -> RelayEnd
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let mut turn = TurnText::default();

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return RelayEnd::Cancelled,
            next = events.next_event() => next,
        };

        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                error!(session_id = %ctx.session, "Upstream error: {}", e);
                return RelayEnd::UpstreamError;
            }
            None => {
                info!(session_id = %ctx.session, "Upstream session ended");
                return RelayEnd::UpstreamEnded;
            }
        };

        // Forward first so nothing below can delay or drop the event
        if let Err(e) = client.send(Message::Binary(event.raw.clone())).await {
            warn!("Failed to forward event to client: {}", e);
            return RelayEnd::ClientError;
        }

        for call in event.tool_calls.iter().cloned() {
            let name = call.name.clone();
            let tools = Arc::clone(&ctx.tools);
            let upstream = Arc::clone(&ctx.upstream);
            let spawned = ctx.tasks.spawn(async move {
                tools.handle_call(call, upstream.as_ref()).await;
            });
            if !spawned {
                warn!(tool = %name, "Too many pending tool calls, dropping call");
            }
        }

        turn.push(&event);
        if event.turn_complete
            && let Some((text, source)) = turn.take()
        {
            let mut metadata = JsonMap::new();
            metadata.insert("source".to_string(), Value::String(source.to_string()));
            if let Some(number) = ctx.session.record_agent_turn(&text, metadata) {
                debug!(session_id = %ctx.session, turn_number = number, "Agent turn recorded");
            }
        }
    }
}

/// Relay settings taken from the server configuration
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    pub max_pending_tools: usize,
    pub tool_drain_timeout: Duration,
}

/// Run both loops until one ends, then tear the session down.
///
/// Teardown order: close the client, drain tool tasks, complete the session,
/// close the upstream.
pub async fn run_relay<S, W, E>(
    client_rx: S,
    mut client_tx: W,
    upstream: UpstreamSession,
    tools: Arc<ToolDispatcher>,
    session: Arc<SessionHandle>,
    settings: RelaySettings,
) -> RelayEnd
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let UpstreamSession { sink, mut events } = upstream;
    let cancel = CancellationToken::new();
    let ctx = DownstreamContext {
        upstream: Arc::clone(&sink),
        tools,
        tasks: ToolTaskSet::new(settings.max_pending_tools),
        session: Arc::clone(&session),
    };

    let end = {
        let client_loop = client_relay_loop(client_rx, Arc::clone(&sink), cancel.clone());
        let downstream_loop =
            downstream_relay_loop(events.as_mut(), &mut client_tx, &ctx, cancel.clone());

        tokio::select! {
            end = client_loop => end,
            end = downstream_loop => end,
        }
    };
    cancel.cancel();

    info!(session_id = %session, reason = ?end, "Relay stopped");

    if let Some(frame) = end.close_frame() {
        let _ = client_tx.send(Message::Close(Some(frame))).await;
    }

    ctx.tasks.drain(settings.tool_drain_timeout).await;
    session.finish().await;

    if let Err(e) = sink.close().await {
        debug!("Failed to close upstream session: {}", e);
    }

    end
}

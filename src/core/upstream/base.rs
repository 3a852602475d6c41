//! Base traits and types for the upstream live session.
//!
//! A live session is a duplex channel to the conversational model: it is
//! configured once at connect time and afterwards accepts raw client frames,
//! tool responses and text turns, while yielding inbound events.
//!
//! The channel is split in two halves so the relay can drive both directions
//! from independent tasks:
//!
//! - [`UpstreamSink`]: shared, write-only half
//! - [`UpstreamEvents`]: exclusively owned, read-only half

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::core::tools::{ToolCall, ToolResponse};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to the upstream model.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection to the upstream failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Missing or invalid configuration (e.g. no API key)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Unexpected message during the setup exchange
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The session writer is gone
    #[error("Not connected")]
    NotConnected,

    /// The upstream closed the session
    #[error("Session closed: {0}")]
    Closed(String),
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Declaration of a function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

/// Per-session configuration sent when the live session is opened.
#[derive(Debug, Clone, Default)]
pub struct LiveSessionConfig {
    /// Composed interviewer instructions
    pub system_instruction: String,
    /// Functions the model may call during the session
    pub tools: Vec<FunctionDeclaration>,
    /// Overrides the configured prebuilt voice
    pub voice: Option<String>,
}

// =============================================================================
// Events
// =============================================================================

/// One inbound upstream event.
///
/// `raw` is the exact payload received and is what gets forwarded to the
/// client. The remaining fields are parsed views used for side effects; an
/// event that could not be parsed carries only `raw`.
#[derive(Debug, Clone, Default)]
pub struct UpstreamEvent {
    pub raw: Bytes,
    pub tool_calls: Vec<ToolCall>,
    pub turn_complete: bool,
    /// Text parts of the model turn carried by this event
    pub agent_text: Option<String>,
    /// Transcription of the model's audio output carried by this event
    pub output_transcript: Option<String>,
}

impl UpstreamEvent {
    /// Event with no parsed view.
    pub fn raw(raw: impl Into<Bytes>) -> Self {
        Self {
            raw: raw.into(),
            ..Default::default()
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Write half of a live session.
#[async_trait]
pub trait UpstreamSink: Send + Sync {
    /// Forward one client frame verbatim.
    async fn send_frame(&self, frame: Bytes) -> UpstreamResult<()>;

    /// Return the result of a tool call.
    async fn send_tool_response(&self, response: ToolResponse) -> UpstreamResult<()>;

    /// Send a complete user text turn.
    async fn send_text(&self, text: &str) -> UpstreamResult<()>;

    /// Close the session. Calling it twice is a no-op.
    async fn close(&self) -> UpstreamResult<()>;
}

/// Read half of a live session.
#[async_trait]
pub trait UpstreamEvents: Send {
    /// Next inbound event, `None` once the upstream has ended cleanly.
    async fn next_event(&mut self) -> Option<UpstreamResult<UpstreamEvent>>;
}

/// An opened live session.
pub struct UpstreamSession {
    pub sink: Arc<dyn UpstreamSink>,
    pub events: Box<dyn UpstreamEvents>,
}

/// Opens live sessions.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Open a session configured with `config`.
    ///
    /// Resolves once the upstream has acknowledged the configuration.
    async fn connect(&self, config: LiveSessionConfig) -> UpstreamResult<UpstreamSession>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_event_has_no_parsed_view() {
        let event = UpstreamEvent::raw(Bytes::from_static(b"{\"x\":1}"));
        assert_eq!(event.raw.as_ref(), b"{\"x\":1}");
        assert!(event.tool_calls.is_empty());
        assert!(!event.turn_complete);
        assert!(event.agent_text.is_none());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(UpstreamError::NotConnected.to_string(), "Not connected");
        assert_eq!(
            UpstreamError::ConnectionFailed("refused".into()).to_string(),
            "Connection failed: refused"
        );
    }
}

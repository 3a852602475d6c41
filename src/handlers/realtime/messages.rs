//! Relay WebSocket message types
//!
//! The client opens with a single JSON setup message. After that all client
//! frames are opaque and forwarded upstream as-is, and every upstream event is
//! forwarded back as a binary frame.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Normal closure
pub const CLOSE_NORMAL: u16 = 1000;

/// The setup message was missing or malformed
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;

/// Unexpected failure; the reason never carries internal detail
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

pub const PROTOCOL_ERROR_REASON: &str = "Protocol Error";
pub const INTERNAL_ERROR_REASON: &str = "Internal server error";

/// Status text sent once the upstream session is ready
pub const READY_MESSAGE: &str = "Agent connected. Ready for audio.";

const NOT_AVAILABLE: &str = "n/a";

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// First client message: `{"setup": {...}}`
#[derive(Debug, Deserialize)]
pub struct SetupEnvelope {
    pub setup: SetupPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupPayload {
    #[serde(default = "not_available")]
    pub run_id: String,
    #[serde(default = "not_available")]
    pub user_id: String,
    #[serde(default)]
    pub context: SetupContext,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetupContext {
    #[serde(default)]
    pub school_id: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

impl SetupPayload {
    /// Target school, if one was given
    pub fn school_id(&self) -> Option<&str> {
        self.context
            .school_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("setup message is not valid: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Parse the first client message.
pub fn parse_setup(payload: &[u8]) -> Result<SetupPayload, SetupError> {
    let envelope: SetupEnvelope = serde_json::from_slice(payload)?;
    Ok(envelope.setup)
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayOutgoingMessage {
    Status { message: String },
}

impl RelayOutgoingMessage {
    pub fn ready() -> Self {
        Self::Status {
            message: READY_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_setup() {
        let payload = json!({
            "setup": {
                "run_id": "run-1",
                "user_id": "user-1",
                "context": {"school_id": "school-9", "user_agent": "Mozilla", "ip_address": "10.0.0.1"}
            }
        })
        .to_string();

        let setup = parse_setup(payload.as_bytes()).unwrap();
        assert_eq!(setup.run_id, "run-1");
        assert_eq!(setup.school_id(), Some("school-9"));
        assert_eq!(setup.context.user_agent.as_deref(), Some("Mozilla"));
    }

    #[test]
    fn test_parse_minimal_setup() {
        let setup = parse_setup(br#"{"setup": {}}"#).unwrap();
        assert_eq!(setup.run_id, "n/a");
        assert_eq!(setup.user_id, "n/a");
        assert_eq!(setup.school_id(), None);
    }

    #[test]
    fn test_blank_school_id_is_absent() {
        let setup = parse_setup(br#"{"setup": {"context": {"school_id": "  "}}}"#).unwrap();
        assert_eq!(setup.school_id(), None);
    }

    #[test]
    fn test_protocol_violations() {
        assert!(parse_setup(br#"{"hello": "world"}"#).is_err());
        assert!(parse_setup(br#"{"setup": "yes"}"#).is_err());
        assert!(parse_setup(br#"[1, 2, 3]"#).is_err());
        assert!(parse_setup(b"\x00\x01\x02").is_err());
    }

    #[test]
    fn test_ready_message() {
        let value = serde_json::to_value(RelayOutgoingMessage::ready()).unwrap();
        assert_eq!(
            value,
            json!({"type": "status", "message": "Agent connected. Ready for audio."})
        );
    }
}

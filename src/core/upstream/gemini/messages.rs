//! Gemini Live wire messages.
//!
//! Only the parts of the protocol the relay needs are modelled. Inbound
//! messages are parsed leniently: unknown fields are ignored and a message
//! that fails to parse is still forwarded raw.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::tools::{ToolCall, ToolResponse};
use crate::core::upstream::base::{FunctionDeclaration, UpstreamEvent};

// =============================================================================
// Outgoing Messages (Relay -> Gemini)
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupMessage {
    pub setup: Setup,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclarations>,
    /// Empty object enables transcription of the model's audio
    pub output_audio_transcription: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
    pub enable_affective_dialog: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclarations {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponseMessage {
    pub tool_response: FunctionResponses,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponses {
    pub function_responses: Vec<ToolResponse>,
}

impl From<ToolResponse> for ToolResponseMessage {
    fn from(response: ToolResponse) -> Self {
        Self {
            tool_response: FunctionResponses {
                function_responses: vec![response],
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContentMessage {
    pub client_content: ClientContent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

impl ClientContentMessage {
    /// A complete user turn holding a single text part.
    pub fn user_text(text: &str) -> Self {
        Self {
            client_content: ClientContent {
                turns: vec![Content::text(Some("user"), text)],
                turn_complete: true,
            },
        }
    }
}

// =============================================================================
// Incoming Messages (Gemini -> Relay)
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub tool_call: Option<ToolCallMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub output_transcription: Option<Transcription>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallMessage {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Option<Map<String, Value>>,
}

impl From<FunctionCall> for ToolCall {
    fn from(call: FunctionCall) -> Self {
        ToolCall {
            id: call.id,
            name: call.name,
            args: call.args.unwrap_or_default(),
        }
    }
}

/// Parse an inbound payload into an event.
///
/// The raw payload is always preserved.
pub fn parse_server_message(raw: Bytes) -> UpstreamEvent {
    let message = match serde_json::from_slice::<ServerMessage>(&raw) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!("Unparsed upstream message ({} bytes): {}", raw.len(), e);
            return UpstreamEvent::raw(raw);
        }
    };

    let mut event = UpstreamEvent::raw(raw);

    if let Some(tool_call) = message.tool_call {
        event.tool_calls = tool_call
            .function_calls
            .into_iter()
            .map(ToolCall::from)
            .collect();
    }

    if let Some(content) = message.server_content {
        event.turn_complete = content.turn_complete;

        let text: String = content
            .model_turn
            .map(|turn| turn.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if !text.is_empty() {
            event.agent_text = Some(text);
        }

        event.output_transcript = content
            .output_transcription
            .and_then(|t| t.text)
            .filter(|t| !t.is_empty());
    }

    event
}

/// Whether a payload is the `setupComplete` acknowledgement.
///
/// Fails when the payload is not a server message at all.
pub fn is_setup_complete(raw: &[u8]) -> Result<bool, serde_json::Error> {
    serde_json::from_slice::<ServerMessage>(raw).map(|m| m.setup_complete.is_some())
}

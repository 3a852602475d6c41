use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::core::persona::{PersonaConfig, Topic};
use crate::core::tools::JsonMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }
}

/// Everything known about a session when it starts.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: String,
    pub school_id: Option<String>,
    pub persona: PersonaConfig,
    pub topics: Vec<Topic>,
    pub user_agent: String,
    pub ip_address: String,
    pub started_at: OffsetDateTime,
}

impl NewSession {
    pub fn persona_json(&self) -> Value {
        serde_json::to_value(&self.persona).unwrap_or(Value::Null)
    }

    pub fn topics_json(&self) -> Value {
        serde_json::to_value(&self.topics).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub session_id: String,
    pub turn_number: u32,
    pub speaker: Speaker,
    pub text: String,
    pub metadata: JsonMap,
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionCompletion {
    pub session_id: String,
    pub total_turns: u32,
    pub duration_seconds: u64,
    pub completed_at: OffsetDateTime,
}

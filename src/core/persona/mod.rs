//! Interviewer persona resolution and instruction composition.

mod resolver;
mod template;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use resolver::{PgPersonaResolver, StaticPersonaResolver};
pub use template::{compose_instructions, topic_summary};

pub const DEFAULT_INTERVIEWER_NAME: &str = "MBA Admissions Interviewer";
pub const DEFAULT_INTERVIEWER_TITLE: &str = "Admissions Committee Member";
pub const DEFAULT_TONE: &str = "warm_professional";
pub const DEFAULT_BEHAVIORAL_NOTES: &str =
    "Be encouraging and supportive while maintaining professionalism";
pub const DEFAULT_GREETING: &str =
    "Hello! I'm excited to learn more about you and your interest in pursuing an MBA.";
pub const DEFAULT_CLOSING: &str =
    "Thank you for this wonderful conversation. We'll be in touch soon.";
pub const DEFAULT_SCHOOL_CONTEXT: &str =
    "A top-tier business school focused on developing tomorrow's leaders";

/// Resolved interviewer identity and script.
///
/// Every field always holds a usable value; missing store values are
/// replaced by the defaults above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub interviewer_name: String,
    pub interviewer_title: String,
    pub tone: String,
    pub behavioral_notes: String,
    pub greeting: String,
    pub closing: String,
    pub school_context: String,
    /// Discussion topics, highest priority first
    #[serde(default)]
    pub topics: Vec<String>,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self::default_persona()
    }
}

impl PersonaConfig {
    /// The neutral interviewer used when nothing better is known.
    pub fn default_persona() -> Self {
        Self {
            interviewer_name: DEFAULT_INTERVIEWER_NAME.to_string(),
            interviewer_title: DEFAULT_INTERVIEWER_TITLE.to_string(),
            tone: DEFAULT_TONE.to_string(),
            behavioral_notes: DEFAULT_BEHAVIORAL_NOTES.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            closing: DEFAULT_CLOSING.to_string(),
            school_context: DEFAULT_SCHOOL_CONTEXT.to_string(),
            topics: Vec::new(),
        }
    }
}

/// A question bank entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub question_text: String,
    #[serde(default)]
    pub priority: Option<i64>,
}

/// Looks up the persona for a target school.
///
/// Never fails: any internal error yields the default persona and no topics.
#[async_trait]
pub trait PersonaResolver: Send + Sync {
    async fn resolve(&self, target_id: &str) -> (PersonaConfig, Vec<Topic>);
}

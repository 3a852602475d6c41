//! Guard for free-text inputs.
//!
//! Rejects empty text, oversized text and common prompt-injection phrasings.
//! Only applies to text paths; audio is never inspected.

use regex::RegexSet;
use std::sync::LazyLock;
use tracing::warn;

/// Maximum accepted length in characters
pub const MAX_INPUT_CHARS: usize = 10_000;

const PROMPT_INJECTION_PATTERNS: &[&str] = &[
    r"(?i)ignore\s+previous\s+instructions",
    r"(?i)you\s+are\s+now\s+a",
    r"(?i)forget\s+your\s+role",
    r"(?i)new\s+system\s+prompt",
    r"(?i)act\s+as\s+if",
    r"(?i)pretend\s+to\s+be",
    r"(?i)roleplay\s+as",
];

static INJECTION_SET: LazyLock<Option<RegexSet>> =
    LazyLock::new(|| match RegexSet::new(PROMPT_INJECTION_PATTERNS) {
        Ok(set) => Some(set),
        Err(e) => {
            tracing::error!("Failed to compile prompt injection patterns: {}", e);
            None
        }
    });

/// Whether `text` is acceptable.
pub fn validate_input(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }

    match INJECTION_SET.as_ref() {
        Some(set) => {
            if let Some(index) = set.matches(text).iter().next() {
                warn!(
                    pattern = PROMPT_INJECTION_PATTERNS[index],
                    "Potential prompt injection detected"
                );
                return false;
            }
        }
        // Without the patterns nothing can be vouched for
        None => return false,
    }

    text.chars().count() <= MAX_INPUT_CHARS
}

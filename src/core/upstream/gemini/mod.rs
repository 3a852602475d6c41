//! Gemini Live (`BidiGenerateContent`) implementation of the upstream session.

mod client;
mod config;
pub mod messages;

pub use client::GeminiLiveConnector;
pub use config::{GEMINI_LIVE_HOST, GeminiLiveConfig};
pub use messages::parse_server_message;

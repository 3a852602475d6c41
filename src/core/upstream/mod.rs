pub mod base;
pub mod gemini;

pub use base::{
    FunctionDeclaration, LiveSessionConfig, UpstreamConnector, UpstreamError, UpstreamEvent,
    UpstreamEvents, UpstreamResult, UpstreamSession, UpstreamSink,
};
pub use gemini::{GeminiLiveConfig, GeminiLiveConnector};

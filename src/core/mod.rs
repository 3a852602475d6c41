pub mod database;
pub mod persona;
pub mod session;
pub mod tools;
pub mod upstream;

// Re-export commonly used types for convenience
pub use database::{Database, StoreError, StoreResult};
pub use persona::{PersonaConfig, PersonaResolver, PgPersonaResolver, StaticPersonaResolver, Topic};
pub use session::{
    MemoryStore, PersistenceStore, PgStore, SessionHandle, SessionId, SessionTracker,
};
pub use tools::{ToolCall, ToolDispatcher, ToolError, ToolRegistry, ToolResponse, ToolTaskSet};
pub use upstream::{
    GeminiLiveConnector, LiveSessionConfig, UpstreamConnector, UpstreamError, UpstreamEvent,
    UpstreamSession, UpstreamSink,
};

//! Session lifecycle: creation, turn logging and completion.

mod pg;
mod store;
mod tracker;
mod types;

pub use pg::PgStore;
pub use store::{MemoryStore, PersistenceStore, StoredSession};
pub use tracker::{PLACEHOLDER_PREFIX, SessionHandle, SessionId, SessionTracker};
pub use types::{ConversationTurn, NewSession, SessionCompletion, SessionStatus, Speaker};

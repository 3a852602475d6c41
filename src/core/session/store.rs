use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;

use super::types::{ConversationTurn, NewSession, SessionCompletion, SessionStatus};
use crate::core::database::{StoreError, StoreResult};

/// Durable storage for sessions and their turns.
///
/// Implementations must be safe to call concurrently and must bound every
/// call in time.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Persist a new `active` session and return its identifier.
    async fn create_session(&self, session: &NewSession) -> StoreResult<String>;

    async fn append_turn(&self, turn: &ConversationTurn) -> StoreResult<()>;

    /// Mark the session completed.
    ///
    /// Returns `false` when the session was already terminal; that is not an
    /// error.
    async fn complete_session(&self, completion: &SessionCompletion) -> StoreResult<bool>;

    /// Release resources on shutdown.
    async fn close(&self);
}

/// A session as held by [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub session: NewSession,
    pub status: SessionStatus,
    pub total_turns: Option<u32>,
    pub duration_seconds: Option<u64>,
    pub completed_at: Option<OffsetDateTime>,
    pub completion_percentage: Option<u8>,
}

#[derive(Default)]
struct MemoryInner {
    sessions: HashMap<String, StoredSession>,
    turns: HashMap<String, Vec<ConversationTurn>>,
    completion_calls: HashMap<String, usize>,
}

/// In-process store, used when no database is configured.
///
/// By default a session and its turns are dropped as soon as the session
/// completes, so only live sessions are held. [`MemoryStore::retaining`]
/// keeps everything for inspection.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    failing: AtomicBool,
    retain_completed: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that keeps completed sessions, turns and completion counts.
    pub fn retaining() -> Self {
        Self {
            retain_completed: true,
            ..Self::default()
        }
    }

    /// A retaining store whose every operation fails.
    pub fn failing() -> Self {
        let store = Self::retaining();
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.inner.lock().sessions.keys().cloned().collect()
    }

    pub fn session(&self, id: &str) -> Option<StoredSession> {
        self.inner.lock().sessions.get(id).cloned()
    }

    /// Turns of a session in insertion order
    pub fn turns(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.inner
            .lock()
            .turns
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// How many times completion was requested for a session
    pub fn completion_calls(&self, session_id: &str) -> usize {
        self.inner
            .lock()
            .completion_calls
            .get(session_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create_session(&self, session: &NewSession) -> StoreResult<String> {
        self.check()?;
        let id = uuid::Uuid::new_v4().to_string();
        self.inner.lock().sessions.insert(
            id.clone(),
            StoredSession {
                session: session.clone(),
                status: SessionStatus::Active,
                total_turns: None,
                duration_seconds: None,
                completed_at: None,
                completion_percentage: None,
            },
        );
        Ok(id)
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> StoreResult<()> {
        self.check()?;
        self.inner
            .lock()
            .turns
            .entry(turn.session_id.clone())
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn complete_session(&self, completion: &SessionCompletion) -> StoreResult<bool> {
        self.check()?;
        let id = &completion.session_id;
        let mut inner = self.inner.lock();

        if !self.retain_completed {
            let completed = inner
                .sessions
                .get(id)
                .is_some_and(|stored| stored.status == SessionStatus::Active);
            inner.sessions.remove(id);
            inner.turns.remove(id);
            return Ok(completed);
        }

        *inner.completion_calls.entry(id.clone()).or_default() += 1;

        match inner.sessions.get_mut(id) {
            Some(stored) if stored.status == SessionStatus::Active => {
                stored.status = SessionStatus::Completed;
                stored.total_turns = Some(completion.total_turns);
                stored.duration_seconds = Some(completion.duration_seconds);
                stored.completed_at = Some(completion.completed_at);
                stored.completion_percentage = Some(100);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn close(&self) {}
}

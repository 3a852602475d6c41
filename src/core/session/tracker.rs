use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::store::PersistenceStore;
use super::types::{ConversationTurn, NewSession, SessionCompletion, Speaker};
use crate::core::tools::JsonMap;

/// Prefix of identifiers handed out when the store is unavailable
pub const PLACEHOLDER_PREFIX: &str = "temp_session_";

/// Identifier of a tracked session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId {
    value: String,
    /// The session was never persisted; writes for it are skipped
    degraded: bool,
}

impl SessionId {
    pub fn persisted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            degraded: false,
        }
    }

    pub fn placeholder() -> Self {
        Self {
            value: format!("{PLACEHOLDER_PREFIX}{}", uuid::Uuid::new_v4()),
            degraded: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Creates, updates and completes session records.
///
/// Store failures are logged and never surfaced to the caller.
#[derive(Clone)]
pub struct SessionTracker {
    store: Arc<dyn PersistenceStore>,
    /// How long `finish` waits for queued turn writes
    flush_timeout: Duration,
}

impl SessionTracker {
    pub fn new(store: Arc<dyn PersistenceStore>, flush_timeout: Duration) -> Self {
        Self {
            store,
            flush_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn PersistenceStore> {
        &self.store
    }

    /// Persist a new active session, falling back to a placeholder id.
    pub async fn start(&self, session: &NewSession) -> SessionId {
        match self.store.create_session(session).await {
            Ok(id) => SessionId::persisted(id),
            Err(e) => {
                let id = SessionId::placeholder();
                error!(
                    store = self.store.name(),
                    session_id = %id,
                    "Failed to create interview session, continuing without persistence: {}", e
                );
                id
            }
        }
    }

    pub async fn record_turn(
        &self,
        session_id: &SessionId,
        turn_number: u32,
        speaker: Speaker,
        text: &str,
        metadata: JsonMap,
    ) {
        if session_id.is_degraded() {
            debug!(session_id = %session_id, turn_number, "Skipping turn write for unpersisted session");
            return;
        }

        let turn = ConversationTurn {
            session_id: session_id.as_str().to_string(),
            turn_number,
            speaker,
            text: text.to_string(),
            metadata,
            timestamp: OffsetDateTime::now_utc(),
        };

        if let Err(e) = self.store.append_turn(&turn).await {
            error!(session_id = %session_id, turn_number, "Failed to save conversation turn: {}", e);
        }
    }

    pub async fn finish(&self, session_id: &SessionId, total_turns: u32, duration_seconds: u64) {
        if session_id.is_degraded() {
            debug!(session_id = %session_id, "Skipping completion for unpersisted session");
            return;
        }

        let completion = SessionCompletion {
            session_id: session_id.as_str().to_string(),
            total_turns,
            duration_seconds,
            completed_at: OffsetDateTime::now_utc(),
        };

        match self.store.complete_session(&completion).await {
            Ok(true) => info!(
                session_id = %session_id,
                total_turns,
                duration_seconds,
                "Interview session completed"
            ),
            Ok(false) => debug!(session_id = %session_id, "Session already completed"),
            Err(e) => error!(session_id = %session_id, "Failed to update session completion: {}", e),
        }
    }

    /// Open a live handle for `session`.
    ///
    /// The store record is created on the handle's writer task, so the
    /// caller never waits on persistence. Requires a Tokio runtime.
    pub fn open(&self, session: NewSession) -> SessionHandle {
        SessionHandle::new(self.clone(), session)
    }
}

enum WriterCommand {
    Turn {
        number: u32,
        text: String,
        metadata: JsonMap,
    },
    Finish {
        total_turns: u32,
        duration_seconds: u64,
    },
}

/// Bookkeeping for one live session.
///
/// A single background task creates the session record, writes turns in
/// the order they were numbered and finally writes the completion. The
/// relay only ever enqueues.
pub struct SessionHandle {
    id: Arc<OnceLock<SessionId>>,
    tracker: SessionTracker,
    turns: AtomicU32,
    started: Instant,
    finished: AtomicBool,
    writer_tx: Mutex<Option<mpsc::UnboundedSender<WriterCommand>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    fn new(tracker: SessionTracker, session: NewSession) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriterCommand>();
        let id = Arc::new(OnceLock::new());

        let writer_tracker = tracker.clone();
        let writer_id = Arc::clone(&id);
        let writer = tokio::spawn(async move {
            let id = writer_tracker.start(&session).await;
            info!(session_id = %id, degraded = id.is_degraded(), "Session record resolved");
            let _ = writer_id.set(id.clone());

            while let Some(command) = rx.recv().await {
                match command {
                    WriterCommand::Turn {
                        number,
                        text,
                        metadata,
                    } => {
                        writer_tracker
                            .record_turn(&id, number, Speaker::Agent, &text, metadata)
                            .await;
                    }
                    WriterCommand::Finish {
                        total_turns,
                        duration_seconds,
                    } => {
                        writer_tracker
                            .finish(&id, total_turns, duration_seconds)
                            .await;
                        break;
                    }
                }
            }
        });

        Self {
            id,
            tracker,
            turns: AtomicU32::new(0),
            started: Instant::now(),
            finished: AtomicBool::new(false),
            writer_tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        }
    }

    /// The session identifier, once the store has answered
    pub fn id(&self) -> Option<&SessionId> {
        self.id.get()
    }

    /// Turns recorded so far
    pub fn turn_count(&self) -> u32 {
        self.turns.load(Ordering::SeqCst)
    }

    fn enqueue(&self, command: WriterCommand) -> bool {
        self.writer_tx
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(command).is_ok())
    }

    /// Record a completed agent turn.
    ///
    /// Blank text is ignored. Returns the assigned turn number.
    pub fn record_agent_turn(&self, text: &str, metadata: JsonMap) -> Option<u32> {
        let text = text.trim();
        if text.is_empty() || self.finished.load(Ordering::SeqCst) {
            return None;
        }

        let number = self.turns.fetch_add(1, Ordering::SeqCst) + 1;
        let sent = self.enqueue(WriterCommand::Turn {
            number,
            text: text.to_string(),
            metadata,
        });
        if !sent {
            warn!(session = %self, turn_number = number, "Turn writer is gone, turn not saved");
        }

        Some(number)
    }

    /// Complete the session. Only the first call has any effect.
    ///
    /// Queued writes and the completion get the tracker's flush timeout;
    /// past it they carry on in the background. Returns `true` for the call
    /// that completed.
    pub async fn finish(&self) -> bool {
        if self.finished.swap(true, Ordering::SeqCst) {
            return false;
        }

        let completion = WriterCommand::Finish {
            total_turns: self.turn_count(),
            duration_seconds: self.started.elapsed().as_secs(),
        };
        if !self.enqueue(completion) {
            warn!(session = %self, "Turn writer is gone, completion not saved");
        }
        drop(self.writer_tx.lock().take());

        let writer = self.writer.lock().take();
        if let Some(mut writer) = writer
            && tokio::time::timeout(self.tracker.flush_timeout, &mut writer)
                .await
                .is_err()
        {
            warn!(session = %self, "Session writes still pending at session end, leaving them to finish");
        }
        true
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => fmt::Display::fmt(id, f),
            None => f.write_str("pending"),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        // Only reached without `finish`, which takes the writer
        if let Some(writer) = self.writer.get_mut().take() {
            writer.abort();
        }
    }
}

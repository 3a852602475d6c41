use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::store::PersistenceStore;
use super::types::{ConversationTurn, NewSession, SessionCompletion, SessionStatus};
use crate::core::database::{Database, StoreError, StoreResult};

/// Postgres-backed session store.
///
/// Every statement goes through the shared pool and is bounded by the
/// configured command timeout.
pub struct PgStore {
    database: Arc<Database>,
}

impl PgStore {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }
}

fn parse_session_id(session_id: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(session_id).map_err(|_| StoreError::InvalidSessionId(session_id.to_string()))
}

#[async_trait]
impl PersistenceStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn create_session(&self, session: &NewSession) -> StoreResult<String> {
        let pool = self.database.pool().await?;
        let id = Uuid::new_v4();

        self.database
            .bounded(
                sqlx::query(
                    r#"
                    INSERT INTO ai_interview_agent_sessions
                        (id, user_id, school_id, status, persona_used, questions_context,
                         started_at, user_agent, ip_address)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(id)
                .bind(&session.user_id)
                .bind(session.school_id.as_deref())
                .bind(SessionStatus::Active.as_str())
                .bind(session.persona_json())
                .bind(session.topics_json())
                .bind(session.started_at)
                .bind(&session.user_agent)
                .bind(&session.ip_address)
                .execute(pool),
            )
            .await??;

        Ok(id.to_string())
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> StoreResult<()> {
        let session_id = parse_session_id(&turn.session_id)?;
        let pool = self.database.pool().await?;

        self.database
            .bounded(
                sqlx::query(
                    r#"
                    INSERT INTO ai_interview_conversation_turns
                        (session_id, turn_number, speaker, message_text, message_metadata, timestamp)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(session_id)
                .bind(turn.turn_number as i32)
                .bind(turn.speaker.as_str())
                .bind(&turn.text)
                .bind(Value::Object(turn.metadata.clone()))
                .bind(turn.timestamp)
                .execute(pool),
            )
            .await??;

        Ok(())
    }

    async fn complete_session(&self, completion: &SessionCompletion) -> StoreResult<bool> {
        let session_id = parse_session_id(&completion.session_id)?;
        let pool = self.database.pool().await?;

        let result = self
            .database
            .bounded(
                sqlx::query(
                    r#"
                    UPDATE ai_interview_agent_sessions
                    SET status = $1, total_turns = $2, duration_seconds = $3,
                        completed_at = $4, completion_percentage = 100
                    WHERE id = $5 AND status = $6
                    "#,
                )
                .bind(SessionStatus::Completed.as_str())
                .bind(completion.total_turns as i32)
                .bind(completion.duration_seconds as i64)
                .bind(completion.completed_at)
                .bind(session_id)
                .bind(SessionStatus::Active.as_str())
                .execute(pool),
            )
            .await??;

        Ok(result.rows_affected() > 0)
    }

    async fn close(&self) {
        self.database.close().await;
    }
}

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

use super::{PersonaConfig, PersonaResolver, Topic};
use crate::core::database::{Database, StoreResult};

/// Upper bound on question bank entries fetched per school
const MAX_TOPICS: i64 = 10;

/// Always returns the default persona.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPersonaResolver;

#[async_trait]
impl PersonaResolver for StaticPersonaResolver {
    async fn resolve(&self, _target_id: &str) -> (PersonaConfig, Vec<Topic>) {
        (PersonaConfig::default_persona(), Vec::new())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PersonaRow {
    interviewer_name: Option<String>,
    interviewer_title: Option<String>,
    tone: Option<String>,
    behavioral_notes: Option<String>,
    greeting: Option<String>,
    closing: Option<String>,
    school_context: Option<String>,
}

impl PersonaRow {
    fn into_persona(self, topics: &[Topic]) -> PersonaConfig {
        let defaults = PersonaConfig::default_persona();
        let or = |value: Option<String>, fallback: String| {
            value.filter(|v| !v.trim().is_empty()).unwrap_or(fallback)
        };

        PersonaConfig {
            interviewer_name: or(self.interviewer_name, defaults.interviewer_name),
            interviewer_title: or(self.interviewer_title, defaults.interviewer_title),
            tone: or(self.tone, defaults.tone),
            behavioral_notes: or(self.behavioral_notes, defaults.behavioral_notes),
            greeting: or(self.greeting, defaults.greeting),
            closing: or(self.closing, defaults.closing),
            school_context: or(self.school_context, defaults.school_context),
            topics: topics.iter().map(|t| t.question_text.clone()).collect(),
        }
    }
}

/// Reads personas and question banks from Postgres.
pub struct PgPersonaResolver {
    database: Arc<Database>,
}

impl PgPersonaResolver {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    async fn fetch(&self, target_id: &str) -> StoreResult<(PersonaConfig, Vec<Topic>)> {
        let pool = self.database.pool().await?;

        let persona: Option<PersonaRow> = self
            .database
            .bounded(
                sqlx::query_as(
                    r#"
                    SELECT interviewer_name, interviewer_title, tone, behavioral_notes,
                           greeting, closing, school_context
                    FROM ai_interview_school_personas
                    WHERE school_id::text = $1 AND is_active = true
                    LIMIT 1
                    "#,
                )
                .bind(target_id)
                .fetch_optional(pool),
            )
            .await??;

        let rows: Vec<(Option<String>, Option<i64>)> = self
            .database
            .bounded(
                sqlx::query_as(
                    r#"
                    SELECT question_text, priority::bigint
                    FROM ai_interview_question_banks
                    WHERE school_id::text = $1 AND is_active = true
                    ORDER BY priority DESC
                    LIMIT $2
                    "#,
                )
                .bind(target_id)
                .bind(MAX_TOPICS)
                .fetch_all(pool),
            )
            .await??;

        let topics: Vec<Topic> = rows
            .into_iter()
            .filter_map(|(text, priority)| {
                text.filter(|t| !t.trim().is_empty())
                    .map(|question_text| Topic {
                        question_text,
                        priority,
                    })
            })
            .collect();

        let persona = match persona {
            Some(row) => row.into_persona(&topics),
            None => {
                debug!(school_id = %target_id, "No active persona, using defaults");
                PersonaConfig {
                    topics: topics.iter().map(|t| t.question_text.clone()).collect(),
                    ..PersonaConfig::default_persona()
                }
            }
        };

        Ok((persona, topics))
    }
}

#[async_trait]
impl PersonaResolver for PgPersonaResolver {
    async fn resolve(&self, target_id: &str) -> (PersonaConfig, Vec<Topic>) {
        match self.fetch(target_id).await {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(school_id = %target_id, "Failed to fetch school persona: {}", e);
                (PersonaConfig::default_persona(), Vec::new())
            }
        }
    }
}

use axum::{Json, extract::State};
use serde_json::{Value, json};
use std::sync::Arc;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Health check
///
/// Returns `{"status": "healthy", "service": "<name>", "timestamp": "<RFC 3339>"}`.
pub async fn health_check(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| AppError::Internal(format!("Failed to format timestamp: {e}")))?;

    Ok(Json(json!({
        "status": "healthy",
        "service": state.config.service_name,
        "timestamp": timestamp,
    })))
}

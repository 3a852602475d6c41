//! Interview feedback endpoint

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::{AppError, AppResult};
use crate::state::AppState;
use crate::utils::validate_input;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    ThumbsUp,
    ThumbsDown,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThumbsUp => "thumbs_up",
            Self::ThumbsDown => "thumbs_down",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub run_id: String,
    pub user_id: String,
    pub rating: Rating,
    #[serde(default)]
    pub comment: String,
}

/// Log feedback for a finished interview.
///
/// Non-empty comments go through the input guard first; a rejected comment
/// yields 400 and is never logged.
pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(feedback) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    if !feedback.comment.is_empty() && !validate_input(&feedback.comment) {
        warn!(
            run_id = %feedback.run_id,
            user_id = %feedback.user_id,
            "Feedback comment rejected by input validation"
        );
        return Err(AppError::InvalidInput);
    }

    info!(
        target: "interview_relay::feedback",
        service = %state.config.service_name,
        run_id = %feedback.run_id,
        user_id = %feedback.user_id,
        rating = feedback.rating.as_str(),
        comment = %feedback.comment,
        "Feedback received"
    );

    Ok(Json(json!({ "status": "logged" })))
}

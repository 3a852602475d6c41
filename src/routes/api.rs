use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, feedback};
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/health", get(api::health_check))
        .route("/feedback", post(feedback::submit_feedback))
        .layer(TraceLayer::new_for_http())
}

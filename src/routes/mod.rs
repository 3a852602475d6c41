pub mod api;
pub mod realtime;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Combine all routes and attach the application state.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(realtime::create_relay_router())
        .with_state(state)
}

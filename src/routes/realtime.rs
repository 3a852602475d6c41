//! Relay WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::realtime::relay_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay WebSocket router
///
/// # Endpoint
///
/// `GET /ws` - WebSocket upgrade for an interview session
///
/// # Protocol
///
/// ```json
/// // Client sends setup first
/// {"setup": {"run_id": "run-1", "user_id": "user-1", "context": {"school_id": "..."}}}
///
/// // Server responds once the live session is ready
/// {"type": "status", "message": "Agent connected. Ready for audio."}
///
/// // Afterwards frames flow both ways verbatim
/// ```
///
/// Requires the router to be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn create_relay_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(relay_handler))
        .layer(TraceLayer::new_for_http())
}

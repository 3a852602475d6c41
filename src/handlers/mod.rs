//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `feedback` - Interview feedback endpoint
//! - `realtime` - Interview relay WebSocket

pub mod api;
pub mod feedback;
pub mod realtime;

pub use realtime::relay_handler;

//! Interview relay WebSocket handlers
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **setup** (first message, JSON):
//!   `{"setup": {"run_id", "user_id", "context": {"school_id", "user_agent", "ip_address"}}}`
//! - **Any later frame**: forwarded upstream verbatim (audio and control alike)
//!
//! ## Server → Client
//!
//! - **status**: `{"type": "status", "message": "..."}` once the live session is ready
//! - **Binary frames**: every upstream event, verbatim and in order
//!
//! A malformed setup closes with 1002, upstream failures close with 1011 and
//! a generic reason, a clean upstream end closes with 1000.

mod handler;
pub mod messages;
pub mod relay;

pub use handler::{SessionPhase, relay_handler};
pub use relay::{RelayEnd, RelaySettings, run_relay};

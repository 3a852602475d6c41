//! Tool dispatch: the static tool table, the dispatcher that executes calls
//! off the relay path, and the per-session set tracking in-flight calls.

mod base;
pub mod builtin;
mod dispatcher;
mod registry;
mod tasks;

pub use base::{
    BlockingTool, JsonMap, ToolCall, ToolError, ToolHandler, ToolResponse, ToolResult, output,
    required_str,
};
pub use dispatcher::{ToolDispatcher, ToolOutcome};
pub use registry::ToolRegistry;
pub use tasks::ToolTaskSet;

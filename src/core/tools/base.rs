//! Tool call types and the handler contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::core::upstream::FunctionDeclaration;

/// Arguments and results are JSON objects.
pub type JsonMap = Map<String, Value>;

/// A request from the model to invoke a named function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque identifier supplied by the upstream
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: JsonMap,
}

/// Result of a tool call. `id` echoes the originating call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: String,
    pub name: String,
    pub response: JsonMap,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool timed out after {0}s")]
    Timeout(u64),

    /// The task running the handler panicked or was cancelled
    #[error("Tool task failed: {0}")]
    TaskFailed(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

/// A callable tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Declaration advertised to the model at setup
    fn declaration(&self) -> FunctionDeclaration;

    async fn execute(&self, args: JsonMap) -> ToolResult<JsonMap>;
}

/// Wraps a synchronous function so it runs on the blocking pool.
pub struct BlockingTool<F> {
    name: &'static str,
    description: &'static str,
    parameters: Value,
    func: Arc<F>,
}

impl<F> BlockingTool<F>
where
    F: Fn(JsonMap) -> ToolResult<JsonMap> + Send + Sync + 'static,
{
    pub fn new(name: &'static str, description: &'static str, parameters: Value, func: F) -> Self {
        Self {
            name,
            description,
            parameters,
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl<F> ToolHandler for BlockingTool<F>
where
    F: Fn(JsonMap) -> ToolResult<JsonMap> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.parameters.clone(),
        }
    }

    async fn execute(&self, args: JsonMap) -> ToolResult<JsonMap> {
        let func = Arc::clone(&self.func);
        tokio::task::spawn_blocking(move || func(args))
            .await
            .map_err(|e| ToolError::TaskFailed(e.to_string()))?
    }
}

/// Read a required string argument.
pub fn required_str<'a>(args: &'a JsonMap, key: &str) -> ToolResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing string argument '{key}'")))
}

/// `{"output": text}`
pub fn output(text: impl Into<String>) -> JsonMap {
    let mut map = JsonMap::new();
    map.insert("output".to_string(), Value::String(text.into()));
    map
}

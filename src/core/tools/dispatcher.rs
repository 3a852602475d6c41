use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, warn};

use super::base::{JsonMap, ToolCall, ToolError, ToolResponse, ToolResult};
use super::registry::ToolRegistry;
use crate::core::upstream::{FunctionDeclaration, UpstreamSink};

/// How a single tool call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Handler succeeded and the response was sent upstream
    Responded,
    /// No handler registered under the requested name
    UnknownTool,
    /// Handler failed, timed out or panicked
    Failed,
    /// Handler ran but the call carried no identifier to answer
    MissingCallId,
    /// Handler succeeded but the upstream rejected the response
    SendFailed,
}

/// Resolves tool calls against the registry and executes them.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.registry.declarations()
    }

    /// Execute a tool by name.
    ///
    /// The handler runs in its own task so a panic stays contained, and it is
    /// aborted once the timeout elapses.
    pub async fn dispatch(&self, name: &str, args: JsonMap) -> ToolResult<JsonMap> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let mut handle = tokio::spawn(async move { tool.execute(args).await });

        match timeout(self.timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                if join_err.is_panic() {
                    Err(ToolError::TaskFailed("handler panicked".to_string()))
                } else {
                    Err(ToolError::TaskFailed("handler cancelled".to_string()))
                }
            }
            Err(_) => {
                handle.abort();
                Err(ToolError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    /// Execute one call and answer it through `sink`.
    ///
    /// A response is only ever sent for a successful handler and a call that
    /// carries an identifier.
    pub async fn handle_call(&self, call: ToolCall, sink: &dyn UpstreamSink) -> ToolOutcome {
        let ToolCall { id, name, args } = call;

        if self.registry.get(&name).is_none() {
            warn!(tool = %name, call_id = ?id, "Unknown tool requested, skipping");
            return ToolOutcome::UnknownTool;
        }

        let response = match self.dispatch(&name, args).await {
            Ok(response) => response,
            Err(e) => {
                error!(tool = %name, call_id = ?id, "Tool execution failed: {}", e);
                return ToolOutcome::Failed;
            }
        };

        let Some(id) = id else {
            warn!(tool = %name, "Tool call has no id, response dropped");
            return ToolOutcome::MissingCallId;
        };

        debug!(tool = %name, call_id = %id, "Sending tool response");
        match sink
            .send_tool_response(ToolResponse { id, name, response })
            .await
        {
            Ok(()) => ToolOutcome::Responded,
            Err(e) => {
                warn!("Failed to send tool response: {}", e);
                ToolOutcome::SendFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tools::base::{BlockingTool, ToolHandler, output};
    use crate::core::upstream::{UpstreamError, UpstreamResult};
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    #[derive(Default)]
    struct RecordingSink {
        responses: Mutex<Vec<ToolResponse>>,
        fail: bool,
    }

    #[async_trait]
    impl UpstreamSink for RecordingSink {
        async fn send_frame(&self, _frame: Bytes) -> UpstreamResult<()> {
            Ok(())
        }

        async fn send_tool_response(&self, response: ToolResponse) -> UpstreamResult<()> {
            if self.fail {
                return Err(UpstreamError::NotConnected);
            }
            self.responses.lock().push(response);
            Ok(())
        }

        async fn send_text(&self, _text: &str) -> UpstreamResult<()> {
            Ok(())
        }

        async fn close(&self) -> UpstreamResult<()> {
            Ok(())
        }
    }

    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn call(id: Option<&str>, name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: id.map(str::to_string),
            name: name.to_string(),
            args: args.as_object().cloned().unwrap_or_default(),
        }
    }

    fn dispatcher() -> ToolDispatcher {
        ToolDispatcher::new(Arc::new(ToolRegistry::builtin()), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_response_echoes_call_id() {
        let sink = RecordingSink::default();
        let outcome = dispatcher()
            .handle_call(
                call(Some("c-1"), "take_interview_notes", json!({"observation": "clear"})),
                &sink,
            )
            .await;

        assert_eq!(outcome, ToolOutcome::Responded);
        let responses = sink.responses.lock();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].id, "c-1");
        assert_eq!(responses[0].name, "take_interview_notes");
        assert_eq!(responses[0].response["output"], "Note recorded: clear");
    }

    #[tokio::test]
    async fn test_unknown_tool_warns_once_and_sends_nothing() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let sink = RecordingSink::default();
        let outcome = dispatcher()
            .handle_call(call(Some("c-2"), "send_email", json!({})), &sink)
            .await;

        assert_eq!(outcome, ToolOutcome::UnknownTool);
        assert!(sink.responses.lock().is_empty());
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_handler_sends_nothing() {
        let sink = RecordingSink::default();
        let outcome = dispatcher()
            .handle_call(call(Some("c-3"), "get_school_info", json!({})), &sink)
            .await;

        assert_eq!(outcome, ToolOutcome::Failed);
        assert!(sink.responses.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_call_id_sends_nothing() {
        let sink = RecordingSink::default();
        let outcome = dispatcher()
            .handle_call(
                call(None, "take_interview_notes", json!({"observation": "x"})),
                &sink,
            )
            .await;

        assert_eq!(outcome, ToolOutcome::MissingCallId);
        assert!(sink.responses.lock().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_is_reported() {
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let outcome = dispatcher()
            .handle_call(
                call(Some("c-4"), "take_interview_notes", json!({"observation": "x"})),
                &sink,
            )
            .await;
        assert_eq!(outcome, ToolOutcome::SendFailed);
    }

    #[tokio::test]
    async fn test_dispatch_timeout() {
        let mut registry = ToolRegistry::new();
        let slow: Arc<dyn ToolHandler> = Arc::new(BlockingTool::new(
            "slow",
            "Sleeps",
            json!({}),
            |_| {
                std::thread::sleep(Duration::from_millis(300));
                Ok(output("late"))
            },
        ));
        registry.register(slow);

        let dispatcher = ToolDispatcher::new(Arc::new(registry), Duration::from_millis(50));
        let result = dispatcher.dispatch("slow", JsonMap::new()).await;
        assert!(matches!(result, Err(ToolError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_dispatch_unknown() {
        let result = dispatcher().dispatch("nope", JsonMap::new()).await;
        assert!(matches!(result, Err(ToolError::UnknownTool(name)) if name == "nope"));
    }

    struct PanickingTool;

    #[async_trait]
    impl ToolHandler for PanickingTool {
        fn name(&self) -> &'static str {
            "explode"
        }

        fn declaration(&self) -> FunctionDeclaration {
            FunctionDeclaration {
                name: "explode".to_string(),
                description: "Panics".to_string(),
                parameters: json!({}),
            }
        }

        async fn execute(&self, _args: JsonMap) -> ToolResult<JsonMap> {
            panic!("handler bug");
        }
    }

    #[tokio::test]
    async fn test_async_handler_panic_is_contained() {
        let mut registry = ToolRegistry::builtin();
        registry.register(Arc::new(PanickingTool));
        let dispatcher = ToolDispatcher::new(Arc::new(registry), Duration::from_secs(5));
        let sink = RecordingSink::default();

        let outcome = dispatcher
            .handle_call(call(Some("c-9"), "explode", json!({})), &sink)
            .await;
        assert_eq!(outcome, ToolOutcome::Failed);
        assert!(sink.responses.lock().is_empty());

        // The dispatcher keeps serving other calls
        let outcome = dispatcher
            .handle_call(
                call(Some("c-10"), "take_interview_notes", json!({"observation": "ok"})),
                &sink,
            )
            .await;
        assert_eq!(outcome, ToolOutcome::Responded);
        assert_eq!(sink.responses.lock()[0].id, "c-10");
    }
}

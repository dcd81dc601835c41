//! ActionRouter -- resolves decisions to handlers and aggregates results.
//!
//! Direct calls run through [`TimeoutExecutor`]; intent calls run the
//! handler's sub-workflow through a [`SubWorkflowRunner`]. Keyed batches are
//! executed entry by entry and folded with [`InvocationResult::combine`].

use std::sync::Arc;

use conductor_types::config::MiddlewareConfig;
use conductor_types::handler::HandlerKind;
use conductor_types::invocation::InvocationResult;
use serde_json::Value;

use super::decision::{Action, Call, Decision};
use super::sub_workflow::SubWorkflowRunner;
use super::timeout::{ExecutionOutcome, TimeoutExecutor};
use crate::handler::{BoxHandler, HandlerRegistry};

/// Routes agent decisions to registered capabilities.
#[derive(Clone)]
pub struct ActionRouter {
    registry: Arc<dyn HandlerRegistry>,
    config: MiddlewareConfig,
}

impl ActionRouter {
    pub fn new(registry: Arc<dyn HandlerRegistry>, config: MiddlewareConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &MiddlewareConfig {
        &self.config
    }

    /// Route a decision with no sub-workflow support.
    ///
    /// Intent calls fail with 500 here; use the orchestrator's `route` to
    /// serve them.
    pub async fn route(&self, decision: &Value) -> InvocationResult {
        self.route_within(decision, None).await
    }

    /// Route a decision, running intent calls through `runner`.
    pub async fn route_within(
        &self,
        decision: &Value,
        runner: Option<&dyn SubWorkflowRunner>,
    ) -> InvocationResult {
        if !self.config.enabled {
            return InvocationResult::no_action(decision.clone());
        }

        let parsed = match Decision::parse(decision) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(decision = %decision, reason = %e, "rejected malformed decision");
                return InvocationResult::bad_decision(e.to_string());
            }
        };

        match parsed {
            Decision::Empty => InvocationResult::no_action(decision.clone()),
            Decision::Single(action) => {
                let handler = self.registry.lookup(&action.capability_id);
                self.dispatch(&action, handler, runner).await
            }
            Decision::Batch(entries) => {
                let mut results = Vec::with_capacity(entries.len());
                for entry in entries {
                    let result = match entry.call {
                        Ok(call) => {
                            let handler = self.find_by_priority(&entry.capability_id);
                            let action = Action {
                                capability_id: entry.capability_id,
                                call,
                            };
                            self.dispatch(&action, handler, runner).await
                        }
                        Err(e) => {
                            tracing::warn!(
                                capability = entry.capability_id.as_str(),
                                reason = %e,
                                "rejected malformed batch entry"
                            );
                            InvocationResult::bad_decision(e.to_string())
                        }
                    };
                    results.push(result);
                }
                InvocationResult::combine(results)
            }
        }
    }

    /// Retriever, then tool, then plugin; first id match wins.
    fn find_by_priority(&self, capability_id: &str) -> Option<BoxHandler> {
        HandlerKind::SEARCH_ORDER.iter().find_map(|kind| {
            self.registry
                .list_by_kind(*kind)
                .into_iter()
                .find(|h| h.id() == capability_id)
        })
    }

    async fn dispatch(
        &self,
        action: &Action,
        handler: Option<BoxHandler>,
        runner: Option<&dyn SubWorkflowRunner>,
    ) -> InvocationResult {
        let cap = action.capability_id.as_str();
        let Some(handler) = handler else {
            tracing::warn!(capability = cap, method = action.call.label(), "capability not found");
            return InvocationResult::not_found(cap, action.call.label());
        };

        match &action.call {
            Call::Method { method, params } => self.call_direct(&handler, method, params).await,
            Call::Intent { intent, context } => {
                Self::call_intent(&handler, intent, context, runner).await
            }
        }
    }

    async fn call_direct(
        &self,
        handler: &BoxHandler,
        method: &str,
        params: &Value,
    ) -> InvocationResult {
        let cap = handler.id();
        if handler.is_remote() {
            tracing::debug!(
                capability = cap,
                method,
                endpoint = handler.endpoint().unwrap_or("<unset>"),
                "invoking remote handler"
            );
        } else {
            tracing::debug!(capability = cap, method, "invoking local handler");
        }

        let timeout = self.config.action_timeout();
        match TimeoutExecutor::run(handler, method, params, timeout).await {
            ExecutionOutcome::Completed(output) => InvocationResult::handled(&output),
            ExecutionOutcome::TimedOut => {
                tracing::warn!(
                    capability = cap,
                    method,
                    params = %params,
                    timeout_secs = timeout.as_secs_f64(),
                    "action timed out"
                );
                InvocationResult::timed_out()
            }
            ExecutionOutcome::Raised(e) => {
                tracing::error!(
                    capability = cap,
                    method,
                    params = %params,
                    error = ?e,
                    "action failed"
                );
                InvocationResult::handler_error(format!("{cap} '{method}' failed: {e}"))
            }
        }
    }

    async fn call_intent(
        handler: &BoxHandler,
        intent: &str,
        context: &str,
        runner: Option<&dyn SubWorkflowRunner>,
    ) -> InvocationResult {
        let cap = handler.id();
        let Some(workflow_id) = handler.sub_workflow_id() else {
            tracing::warn!(capability = cap, intent, "capability has no sub-workflow");
            return InvocationResult::bad_decision(format!(
                "{cap} does not support intent-based calls"
            ));
        };
        let Some(runner) = runner else {
            tracing::error!(capability = cap, intent, "no workflow runner for intent call");
            return InvocationResult::handler_error(format!(
                "{cap} intent call needs a workflow orchestrator"
            ));
        };

        let input = format!("Intent: {intent}\nContext: {context}");
        tracing::debug!(capability = cap, workflow_id, "running intent sub-workflow");
        match runner.run_sub_workflow(workflow_id, input).await {
            Ok(output) => InvocationResult::handled(&Value::String(output)),
            Err(e) => {
                tracing::error!(
                    capability = cap,
                    workflow_id,
                    intent,
                    context,
                    error = %e,
                    "intent sub-workflow failed"
                );
                InvocationResult::handler_error(format!("{cap} intent failed: {e}"))
            }
        }
    }
}

impl std::fmt::Debug for ActionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRouter")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use conductor_types::error::ErrorKind;
    use conductor_types::invocation::{
        STATUS_BAD_DECISION, STATUS_HANDLED, STATUS_HANDLER_ERROR, STATUS_NOT_FOUND,
        STATUS_NO_ACTION, TIMEOUT_MESSAGE,
    };
    use futures_util::future::BoxFuture;
    use serde_json::json;

    use crate::handler::{Handler, HandlerError, InMemoryHandlerRegistry};
    use crate::router::SubWorkflowError;

    struct FileTool {
        id: &'static str,
        kind: HandlerKind,
        calls: Arc<AtomicUsize>,
        sub_workflow: Option<&'static str>,
    }

    impl Handler for FileTool {
        fn id(&self) -> &str {
            self.id
        }

        fn kind(&self) -> HandlerKind {
            self.kind
        }

        fn sub_workflow_id(&self) -> Option<&str> {
            self.sub_workflow
        }

        async fn invoke(&self, method: &str, params: &Value) -> Result<Value, HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match method {
                "read_file" => {
                    let path = params["path"].as_str().unwrap_or_default();
                    Ok(json!({"path": path, "contents": format!("<{path}>")}))
                }
                "kind" => Ok(json!(self.kind.to_string())),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(json!("late"))
                }
                _ => Err(HandlerError::UnknownMethod(method.to_string())),
            }
        }
    }

    struct Fixture {
        router: ActionRouter,
        calls: Arc<AtomicUsize>,
    }

    fn fixture(config: MiddlewareConfig) -> Fixture {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = InMemoryHandlerRegistry::new();
        for (id, kind, sub_workflow) in [
            ("fs", HandlerKind::Tool, None),
            ("search", HandlerKind::Plugin, None),
            ("search", HandlerKind::Retriever, None),
            ("github", HandlerKind::Tool, Some("github-flow")),
        ] {
            registry.register(BoxHandler::new(FileTool {
                id,
                kind,
                calls: calls.clone(),
                sub_workflow,
            }));
        }
        Fixture {
            router: ActionRouter::new(Arc::new(registry), config),
            calls,
        }
    }

    fn default_fixture() -> Fixture {
        fixture(MiddlewareConfig::default())
    }

    struct EchoRunner;

    impl SubWorkflowRunner for EchoRunner {
        fn run_sub_workflow<'a>(
            &'a self,
            workflow_id: &'a str,
            user_input: String,
        ) -> BoxFuture<'a, Result<String, SubWorkflowError>> {
            Box::pin(async move {
                if workflow_id == "github-flow" {
                    Ok(format!("[{workflow_id}] {user_input}"))
                } else {
                    Err(SubWorkflowError::NotFound(workflow_id.to_string()))
                }
            })
        }
    }

    #[tokio::test]
    async fn test_direct_call_payload_is_serialized_handler_output() {
        let f = default_fixture();
        let result = f
            .router
            .route(&json!({"tool": "fs", "method": "read_file", "params": {"path": "/tmp/x"}}))
            .await;
        assert_eq!(result.status_code, STATUS_HANDLED);
        assert_eq!(
            result.payload_text(),
            serde_json::to_string(&json!({"path": "/tmp/x", "contents": "</tmp/x>"})).unwrap()
        );
    }

    #[tokio::test]
    async fn test_route_is_idempotent_for_pure_handler() {
        let f = default_fixture();
        let decision = json!({"tool": "fs", "method": "read_file", "params": {"path": "a"}});
        let first = f.router.route(&decision).await;
        let second = f.router.route(&decision).await;
        assert_eq!(first, second);
        assert_eq!(f.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unregistered_capability_is_404_without_invocation() {
        let f = default_fixture();
        let result = f
            .router
            .route(&json!({"tool": "db", "method": "query", "params": {}}))
            .await;
        assert_eq!(result.status_code, STATUS_NOT_FOUND);
        assert_eq!(result.payload_text(), "db 'query' not found.");
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_intent_and_method_is_400() {
        let f = default_fixture();
        for decision in [
            json!({"tool": "fs"}),
            json!({"tool": "fs", "params": {"path": "a"}, "context": "x"}),
            json!({"fs": {"params": {}}}),
        ] {
            let result = f.router.route(&decision).await;
            assert_eq!(result.status_code, STATUS_BAD_DECISION, "{decision}");
            assert_eq!(result.payload_text(), "must have either intent or method field");
            assert_eq!(result.error_kind, Some(ErrorKind::MalformedDecision));
        }
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_inputs() {
        let f = default_fixture();
        let result = f.router.route(&json!(12)).await;
        assert_eq!(result.payload_text(), "invalid input type");
        let result = f.router.route(&json!({"method": "read_file"})).await;
        assert_eq!(result.payload_text(), "missing tool field");
        assert_eq!(result.status_code, STATUS_BAD_DECISION);
    }

    #[tokio::test]
    async fn test_empty_decision_passes_through() {
        let f = default_fixture();
        let result = f.router.route(&json!("")).await;
        assert_eq!(result.status_code, STATUS_NO_ACTION);
        assert_eq!(result.payload, json!(""));
    }

    #[tokio::test]
    async fn test_disabled_middleware_passes_everything_through() {
        let f = fixture(MiddlewareConfig {
            enabled: false,
            ..MiddlewareConfig::default()
        });
        let decision = json!({"tool": "fs", "method": "read_file", "params": {"path": "a"}});
        let result = f.router.route(&decision).await;
        assert_eq!(result.status_code, STATUS_NO_ACTION);
        assert_eq!(result.payload, decision);
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_is_500_with_prefix() {
        let f = default_fixture();
        let result = f.router.route(&json!({"tool": "fs", "method": "rm"})).await;
        assert_eq!(result.status_code, STATUS_HANDLER_ERROR);
        assert_eq!(result.error_kind, Some(ErrorKind::HandlerExecutionError));
        assert!(result.payload_text().starts_with("[ERROR] fs 'rm' failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_times_out() {
        let f = fixture(MiddlewareConfig {
            enabled: true,
            action_timeout_secs: 1,
        });
        let start = tokio::time::Instant::now();
        let result = f.router.route(&json!({"tool": "fs", "method": "slow"})).await;
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(result.status_code, STATUS_HANDLER_ERROR);
        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(result.payload_text(), TIMEOUT_MESSAGE);
    }

    #[tokio::test]
    async fn test_batch_combines_in_input_order() {
        let f = default_fixture();
        let result = f
            .router
            .route(&json!({
                "fs": {"method": "read_file", "params": {"path": "a"}},
                "web": {"method": "query", "params": {}}
            }))
            .await;
        assert_eq!(result.status_code, STATUS_NOT_FOUND);
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
        let text = result.payload_text();
        let parts: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains("<a>"));
        assert_eq!(parts[1], "web 'query' not found.");
    }

    #[tokio::test]
    async fn test_batch_status_and_payload_follow_input_order() {
        let f = default_fixture();
        let decision: Value = serde_json::from_str(
            r#"{"search": {"method": "kind"}, "missing": {"method": "q"}, "fs": {"method": "boom"}}"#,
        )
        .unwrap();

        let result = f.router.route(&decision).await;

        assert_eq!(result.status_code, STATUS_NOT_FOUND);
        assert_eq!(result.error_kind, Some(ErrorKind::CapabilityNotFound));
        let text = result.payload_text();
        let parts: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "retriever");
        assert_eq!(parts[1], "missing 'q' not found.");
        assert!(parts[2].starts_with("[ERROR] fs 'boom' failed"));
        assert_eq!(f.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_batch_prefers_retriever_over_plugin() {
        let f = default_fixture();
        let result = f.router.route(&json!({"search": {"method": "kind"}})).await;
        assert_eq!(result.status_code, STATUS_HANDLED);
        assert_eq!(result.payload_text(), "retriever");
    }

    #[tokio::test]
    async fn test_intent_runs_sub_workflow() {
        let f = default_fixture();
        let decision = json!({
            "tool": "github",
            "intent": "create an issue",
            "context": "repo: foo, title: bar"
        });
        let result = f.router.route_within(&decision, Some(&EchoRunner)).await;
        assert_eq!(result.status_code, STATUS_HANDLED);
        assert_eq!(
            result.payload_text(),
            "[github-flow] Intent: create an issue\nContext: repo: foo, title: bar"
        );
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_intent_without_runner_is_500() {
        let f = default_fixture();
        let decision = json!({"tool": "github", "intent": "create an issue"});
        let result = f.router.route(&decision).await;
        assert_eq!(result.status_code, STATUS_HANDLER_ERROR);
        assert!(result.payload_text().starts_with("[ERROR]"));
    }

    #[tokio::test]
    async fn test_intent_on_tool_without_sub_workflow_is_400() {
        let f = default_fixture();
        let decision = json!({"tool": "fs", "intent": "tidy up"});
        let result = f.router.route_within(&decision, Some(&EchoRunner)).await;
        assert_eq!(result.status_code, STATUS_BAD_DECISION);
    }

    #[tokio::test]
    async fn test_intent_unknown_capability_is_404() {
        let f = default_fixture();
        let decision = json!({"tool": "jira", "intent": "file a bug"});
        let result = f.router.route_within(&decision, Some(&EchoRunner)).await;
        assert_eq!(result.status_code, STATUS_NOT_FOUND);
        assert_eq!(result.payload_text(), "jira 'file a bug' not found.");
    }
}

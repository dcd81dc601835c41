//! Step runner for the three step kinds.
//!
//! `StepRunner` executes one attempt of one step against an already
//! interpolated input. Agent and navigation steps chat with the named agent;
//! function steps build a decision and hand it to the action router.
//! Retries, timeouts and output recording belong to the orchestrator.

use std::sync::Arc;

use conductor_types::error::ErrorKind;
use conductor_types::invocation::STATUS_HANDLER_ERROR;
use conductor_types::workflow::{NavigationSpec, StepDefinition, StepKind};
use serde_json::Value;

use super::context::ContextError;
use crate::agent::{AgentError, AgentRegistry};
use crate::router::{ActionRouter, SubWorkflowRunner};

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum StepError {
    #[error("agent '{0}' is not registered")]
    AgentNotFound(String),

    #[error("agent '{agent}' failed: {source}")]
    AgentFailed { agent: String, source: AgentError },

    /// The router answered with a handler error or timeout.
    #[error("{message}")]
    Action { kind: ErrorKind, message: String },

    #[error("step timed out after {0}s")]
    Timeout(u64),

    #[error("template error: {0}")]
    Template(#[from] ContextError),
}

impl StepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StepError::AgentNotFound(_) => ErrorKind::CapabilityNotFound,
            StepError::AgentFailed { .. } => ErrorKind::HandlerExecutionError,
            StepError::Action { kind, .. } => *kind,
            StepError::Timeout(_) => ErrorKind::Timeout,
            StepError::Template(_) => ErrorKind::MalformedDecision,
        }
    }
}

// ---------------------------------------------------------------------------
// StepRunner
// ---------------------------------------------------------------------------

pub struct StepRunner {
    agents: AgentRegistry,
    router: Arc<ActionRouter>,
}

impl StepRunner {
    pub fn new(agents: AgentRegistry, router: Arc<ActionRouter>) -> Self {
        Self { agents, router }
    }

    pub fn router(&self) -> &ActionRouter {
        &self.router
    }

    /// Run one attempt of `step` with its interpolated `input`.
    ///
    /// Routed decisions that end in 400 or 404 are returned as output so the
    /// workflow can react to them; only 500 results are errors.
    pub async fn run_attempt(
        &self,
        step: &StepDefinition,
        input: &str,
        sub_workflows: &dyn SubWorkflowRunner,
    ) -> Result<String, StepError> {
        match step.kind {
            StepKind::Agent => self.chat(&step.target, input).await,
            StepKind::NavigationDecision => {
                let prompt = match &step.navigation {
                    Some(nav) => navigation_prompt(input, nav),
                    None => input.to_string(),
                };
                self.chat(&step.target, &prompt).await
            }
            StepKind::Function => {
                let decision = function_decision(&step.target, input);
                let result = self
                    .router
                    .route_within(&decision, Some(sub_workflows))
                    .await;
                if result.status_code == STATUS_HANDLER_ERROR {
                    return Err(StepError::Action {
                        kind: result.error_kind.unwrap_or(ErrorKind::HandlerExecutionError),
                        message: result.payload_text(),
                    });
                }
                if !result.is_success() {
                    tracing::debug!(
                        step_id = step.id.as_str(),
                        status = result.status_code,
                        "routed decision rejected, passing result to workflow"
                    );
                }
                Ok(result.payload_text())
            }
        }
    }

    async fn chat(&self, agent_name: &str, input: &str) -> Result<String, StepError> {
        let agent = self
            .agents
            .get(agent_name)
            .ok_or_else(|| StepError::AgentNotFound(agent_name.to_string()))?;
        agent.chat(input).await.map_err(|source| StepError::AgentFailed {
            agent: agent_name.to_string(),
            source,
        })
    }
}

/// Build the decision a function step routes.
///
/// A JSON object carrying `method` or `intent` at the top level is a call
/// against the step's own capability unless it names another one. Any other
/// JSON is routed as-is, and non-JSON text is routed as a raw string (which
/// the router rejects as malformed).
pub fn function_decision(capability_id: &str, input: &str) -> Value {
    match serde_json::from_str::<Value>(input) {
        Ok(Value::Object(mut map)) => {
            let is_call = map.contains_key("method") || map.contains_key("intent");
            let names_capability = map.contains_key("tool") || map.contains_key("capability_id");
            if is_call && !names_capability {
                map.insert("tool".to_string(), Value::String(capability_id.to_string()));
            }
            Value::Object(map)
        }
        Ok(other) => other,
        Err(_) => Value::String(input.to_string()),
    }
}

fn navigation_prompt(input: &str, nav: &NavigationSpec) -> String {
    let mut prompt = String::from(input);
    prompt.push_str("\n\nChoose the next step. Reply with exactly one of these step ids:\n");
    for candidate in &nav.available_steps {
        if candidate.description.is_empty() {
            prompt.push_str(&format!("- {}\n", candidate.id));
        } else {
            prompt.push_str(&format!("- {}: {}\n", candidate.id, candidate.description));
        }
    }
    prompt
}

//! Workflow domain types for Conductor.
//!
//! A workflow is a directed graph of steps. Each step names the agent or
//! function it dispatches to, an input template interpolated against the run
//! context, and its outgoing edges (other step ids or the `user` sink). Steps
//! sharing a `fan_key` fan out; the step marked `is_fan_in` joins them.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Edge target that ends a branch and hands its output back to the caller.
pub const USER_EDGE: &str = "user";

// ---------------------------------------------------------------------------
// Workflow Definition
// ---------------------------------------------------------------------------

/// A loaded workflow graph. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow id, used by intent-based tools to name their sub-workflow.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Explicit entry step. Defaults to the first step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    pub steps: Vec<StepDefinition>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl WorkflowDefinition {
    /// The step a run starts at.
    pub fn entry_step_id(&self) -> Option<&str> {
        self.entry
            .as_deref()
            .or_else(|| self.steps.first().map(|s| s.id.as_str()))
    }

    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }
}

// ---------------------------------------------------------------------------
// Step Definition
// ---------------------------------------------------------------------------

/// A single step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Unique within a workflow.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// Input template, e.g. `"Summarize: ${context.step_outputs.fetch}"`.
    #[serde(default)]
    pub input: String,
    /// Agent name (agent and navigation steps) or capability id (function steps).
    #[serde(default, alias = "agent", alias = "function")]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fan_key: Option<String>,
    #[serde(default)]
    pub is_fan_in: bool,
    /// Extra attempts after the first failure.
    #[serde(default)]
    pub retry: u32,
    /// Step to jump to once retries are exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<NavigationSpec>,
    /// Outgoing edges: step ids or [`USER_EDGE`]. Empty means `user`.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Per-attempt timeout (defaults to the orchestrator config).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Also publish the output into `variables[output_var]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_var: Option<String>,
}

impl StepDefinition {
    /// Whether this step is a fan-out member (has a fan key, not the join).
    pub fn is_fan_member(&self) -> bool {
        self.fan_key.is_some() && !self.is_fan_in
    }

    /// Every step id this step can transfer control to (excluding `user`).
    pub fn successor_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .outputs
            .iter()
            .map(String::as_str)
            .filter(|id| *id != USER_EDGE)
            .collect();
        if let Some(on_error) = &self.on_error {
            ids.push(on_error.as_str());
        }
        if let Some(nav) = &self.navigation {
            ids.extend(nav.referenced_step_ids().filter(|id| *id != USER_EDGE));
        }
        ids
    }
}

/// The kind of step in a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Chat with an agent collaborator.
    Agent,
    /// Route a decision through the action router.
    Function,
    /// Ask an agent which step comes next.
    NavigationDecision,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Agent => write!(f, "agent"),
            StepKind::Function => write!(f, "function"),
            StepKind::NavigationDecision => write!(f, "navigation_decision"),
        }
    }
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// How the next step is chosen when a step declares navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationSpec {
    pub mode: NavigationMode,
    #[serde(default)]
    pub available_steps: Vec<AvailableStep>,
    #[serde(default)]
    pub rules: Vec<NavigationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_step: Option<String>,
}

impl NavigationSpec {
    pub fn is_available(&self, step_id: &str) -> bool {
        self.available_steps.iter().any(|s| s.id == step_id)
    }

    /// All step ids named by candidates, rules and the fallback.
    pub fn referenced_step_ids(&self) -> impl Iterator<Item = &str> {
        self.available_steps
            .iter()
            .map(|s| s.id.as_str())
            .chain(self.rules.iter().map(|r| r.target_step.as_str()))
            .chain(self.fallback_step.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationMode {
    /// The acting agent picks.
    Manual,
    /// First matching rule picks.
    Conditional,
    /// Rules first, then the agent.
    Hybrid,
    /// Random pick proportional to weights.
    Weighted,
}

impl fmt::Display for NavigationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationMode::Manual => write!(f, "manual"),
            NavigationMode::Conditional => write!(f, "conditional"),
            NavigationMode::Hybrid => write!(f, "hybrid"),
            NavigationMode::Weighted => write!(f, "weighted"),
        }
    }
}

/// A navigation candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableStep {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl AvailableStep {
    /// Weight used by weighted navigation (default 1.0).
    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// A conditional navigation rule. All `conditions` (JEXL expressions over the
/// run variables) must be truthy for the rule to match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationRule {
    #[serde(default)]
    pub conditions: Vec<String>,
    pub target_step: String,
}

/// The outcome of a navigation decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationDecision {
    pub chosen_step_id: String,
    pub reasoning: String,
    /// In `[0, 1]`. 1.0 for rule matches, 0.0 for fallbacks after an invalid choice.
    pub confidence: f64,
}

/// Audit entry for one navigation decision within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationRecord {
    pub from_step: String,
    pub mode: NavigationMode,
    pub decision: NavigationDecision,
    pub decided_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Run status
// ---------------------------------------------------------------------------

/// Lifecycle status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    AwaitingFanIn,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::AwaitingFanIn => "awaiting_fan_in",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_defaults() {
        let step: StepDefinition = serde_json::from_value(json!({
            "id": "greet",
            "type": "agent",
            "agent": "assistant",
            "input": "${context.user_input}"
        }))
        .unwrap();
        assert_eq!(step.kind, StepKind::Agent);
        assert_eq!(step.target, "assistant");
        assert_eq!(step.retry, 0);
        assert!(!step.is_fan_in);
        assert!(step.outputs.is_empty());
        assert!(step.navigation.is_none());
    }

    #[test]
    fn test_entry_defaults_to_first_step() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "id": "chat",
            "steps": [
                {"id": "a", "type": "agent", "agent": "x"},
                {"id": "b", "type": "agent", "agent": "x"}
            ]
        }))
        .unwrap();
        assert_eq!(def.entry_step_id(), Some("a"));
        assert!(def.step("b").is_some());
        assert!(def.step("c").is_none());
    }

    #[test]
    fn test_explicit_entry() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "id": "chat",
            "entry": "b",
            "steps": [
                {"id": "a", "type": "agent", "agent": "x"},
                {"id": "b", "type": "agent", "agent": "x"}
            ]
        }))
        .unwrap();
        assert_eq!(def.entry_step_id(), Some("b"));
    }

    #[test]
    fn test_navigation_spec_parsing() {
        let spec: NavigationSpec = serde_json::from_value(json!({
            "mode": "hybrid",
            "available_steps": [
                {"id": "refund", "description": "issue a refund", "weight": 3.0},
                {"id": "escalate"}
            ],
            "rules": [{"conditions": ["tier == 'gold'"], "target_step": "escalate"}],
            "fallback_step": "escalate"
        }))
        .unwrap();
        assert_eq!(spec.mode, NavigationMode::Hybrid);
        assert!(spec.is_available("refund"));
        assert!(!spec.is_available("close"));
        assert_eq!(spec.available_steps[1].effective_weight(), 1.0);
        let ids: Vec<&str> = spec.referenced_step_ids().collect();
        assert_eq!(ids, vec!["refund", "escalate", "escalate", "escalate"]);
    }

    #[test]
    fn test_successor_ids_skip_user_edge() {
        let step: StepDefinition = serde_json::from_value(json!({
            "id": "a",
            "type": "function",
            "function": "fs",
            "outputs": ["b", "user"],
            "on_error": "recover"
        }))
        .unwrap();
        assert_eq!(step.successor_ids(), vec!["b", "recover"]);
    }

    #[test]
    fn test_fan_member() {
        let member: StepDefinition = serde_json::from_value(json!({
            "id": "p1", "type": "agent", "agent": "x", "fan_key": "G"
        }))
        .unwrap();
        let join: StepDefinition = serde_json::from_value(json!({
            "id": "j", "type": "agent", "agent": "x", "fan_key": "G", "is_fan_in": true
        }))
        .unwrap();
        assert!(member.is_fan_member());
        assert!(!join.is_fan_member());
    }

    #[test]
    fn test_run_status_terminal() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::AwaitingFanIn.is_terminal());
        assert_eq!(RunStatus::AwaitingFanIn.to_string(), "awaiting_fan_in");
    }
}

//! Configuration types for Conductor.
//!
//! `ConductorConfig` represents the top-level `conductor.toml`. All fields
//! have sensible defaults so an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::handler::HandlerKind;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConductorConfig {
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Remote (HTTP) tools registered at startup.
    #[serde(default)]
    pub tools: Vec<RemoteToolConfig>,
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Action router settings, passed explicitly at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// When false, `route` passes every decision through untouched (status 200).
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Per-action wall-clock bound.
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_action_timeout_secs() -> u64 {
    30
}

impl MiddlewareConfig {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            action_timeout_secs: default_action_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// What interpolation does with a `${context.…}` path that does not resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPolicy {
    /// Leave the token in the text unchanged.
    #[default]
    Keep,
    /// Fail the step.
    Error,
}

/// Workflow orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-attempt step timeout when the step does not set its own.
    #[serde(default = "default_step_timeout_secs")]
    pub default_step_timeout_secs: u64,

    /// Optional deadline for a whole run. `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,

    /// Delay before the first retry of a step; doubles for each later retry.
    #[serde(default)]
    pub retry_backoff_ms: u64,

    /// Maximum nesting of intent-based sub-workflows.
    #[serde(default = "default_max_sub_workflow_depth")]
    pub max_sub_workflow_depth: u32,

    #[serde(default)]
    pub unresolved_policy: UnresolvedPolicy,

    /// Capacity of the run event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_step_timeout_secs() -> u64 {
    300
}

fn default_max_sub_workflow_depth() -> u32 {
    5
}

fn default_event_capacity() -> usize {
    1024
}

impl OrchestratorConfig {
    pub fn step_timeout(&self, step_timeout_secs: Option<u64>) -> Duration {
        Duration::from_secs(step_timeout_secs.unwrap_or(self.default_step_timeout_secs))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_step_timeout_secs: default_step_timeout_secs(),
            run_timeout_secs: None,
            retry_backoff_ms: 0,
            max_sub_workflow_depth: default_max_sub_workflow_depth(),
            unresolved_policy: UnresolvedPolicy::Keep,
            event_capacity: default_event_capacity(),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote tools
// ---------------------------------------------------------------------------

/// A capability served over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteToolConfig {
    pub id: String,
    #[serde(default = "default_remote_kind")]
    pub kind: HandlerKind,
    pub endpoint: String,
    /// Workflow that handles intent-based calls to this tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_workflow: Option<String>,
}

fn default_remote_kind() -> HandlerKind {
    HandlerKind::Tool
}

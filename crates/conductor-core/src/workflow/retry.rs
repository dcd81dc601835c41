//! Retry policy for workflow steps.
//!
//! Stateless: all logic lives in associated functions that take the step and
//! orchestrator configuration as parameters. A step with `retry = n` gets up
//! to `n + 1` attempts, and only retryable error kinds are re-attempted.

use std::time::Duration;

use conductor_types::config::OrchestratorConfig;
use conductor_types::error::ErrorKind;
use conductor_types::workflow::{StepDefinition, WorkflowDefinition};

/// Backoff stops growing after this many doublings.
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

pub struct RetryHandler;

impl RetryHandler {
    /// Total attempts allowed for `step`.
    pub fn max_attempts(step: &StepDefinition) -> u32 {
        step.retry.saturating_add(1)
    }

    /// Whether attempt number `attempt` (1-based) may be followed by another.
    pub fn should_retry(step: &StepDefinition, attempt: u32, kind: ErrorKind) -> bool {
        kind.is_retryable() && attempt < Self::max_attempts(step)
    }

    /// Delay before the attempt after `attempt` (1-based).
    ///
    /// Doubles per attempt starting from the configured base, capped at
    /// `2^MAX_BACKOFF_DOUBLINGS` times the base.
    pub fn backoff(config: &OrchestratorConfig, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS);
        config.retry_backoff() * (1u32 << doublings)
    }

    /// Error kind reported when a step gives up.
    ///
    /// Retryable failures of a step that had retries configured surface as
    /// `WorkflowStepExhaustedRetries`; everything else keeps its own kind.
    pub fn terminal_kind(step: &StepDefinition, kind: ErrorKind) -> ErrorKind {
        if step.retry > 0 && kind.is_retryable() {
            ErrorKind::WorkflowStepExhaustedRetries
        } else {
            kind
        }
    }

    /// Worst-case wall-clock time of one step: every attempt hits its timeout.
    pub fn worst_case_step(config: &OrchestratorConfig, step: &StepDefinition) -> Duration {
        let attempts = Self::max_attempts(step);
        let timeouts = config.step_timeout(step.timeout_secs) * attempts;
        let backoffs: Duration = (1..attempts).map(|attempt| Self::backoff(config, attempt)).sum();
        timeouts + backoffs
    }

    /// Worst-case duration of a run that executes every step sequentially.
    ///
    /// An upper bound: fan-out members overlap in practice, and navigation
    /// skips branches.
    pub fn worst_case_duration(config: &OrchestratorConfig, def: &WorkflowDefinition) -> Duration {
        def.steps
            .iter()
            .map(|step| Self::worst_case_step(config, step))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(retry: u32, timeout_secs: Option<u64>) -> StepDefinition {
        serde_json::from_value(json!({
            "id": "s", "type": "function", "function": "fs",
            "retry": retry, "timeout_secs": timeout_secs
        }))
        .unwrap()
    }

    #[test]
    fn test_retry_two_allows_three_attempts() {
        let step = step(2, None);
        assert_eq!(RetryHandler::max_attempts(&step), 3);
        assert!(RetryHandler::should_retry(&step, 1, ErrorKind::HandlerExecutionError));
        assert!(RetryHandler::should_retry(&step, 2, ErrorKind::Timeout));
        assert!(!RetryHandler::should_retry(&step, 3, ErrorKind::HandlerExecutionError));
    }

    #[test]
    fn test_non_retryable_kinds() {
        let step = step(5, None);
        assert!(!RetryHandler::should_retry(&step, 1, ErrorKind::CapabilityNotFound));
        assert!(!RetryHandler::should_retry(&step, 1, ErrorKind::MalformedDecision));
    }

    #[test]
    fn test_terminal_kind() {
        assert_eq!(
            RetryHandler::terminal_kind(&step(2, None), ErrorKind::Timeout),
            ErrorKind::WorkflowStepExhaustedRetries
        );
        assert_eq!(
            RetryHandler::terminal_kind(&step(0, None), ErrorKind::Timeout),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn test_worst_case_duration() {
        let config = OrchestratorConfig {
            default_step_timeout_secs: 10,
            retry_backoff_ms: 500,
            ..OrchestratorConfig::default()
        };
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "id": "wf",
            "steps": [
                {"id": "a", "type": "agent", "agent": "x", "retry": 2, "outputs": ["b"]},
                {"id": "b", "type": "agent", "agent": "x", "timeout_secs": 4}
            ]
        }))
        .unwrap();
        // a: 3 * 10s + (0.5s + 1s), b: 1 * 4s
        assert_eq!(
            RetryHandler::worst_case_duration(&config, &def),
            Duration::from_millis(35_500)
        );
        assert_eq!(
            RetryHandler::worst_case_step(&config, &step(1, Some(3))),
            Duration::from_millis(6500)
        );
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let config = OrchestratorConfig {
            retry_backoff_ms: 100,
            ..OrchestratorConfig::default()
        };
        assert_eq!(RetryHandler::backoff(&config, 1), Duration::from_millis(100));
        assert_eq!(RetryHandler::backoff(&config, 2), Duration::from_millis(200));
        assert_eq!(RetryHandler::backoff(&config, 3), Duration::from_millis(400));
        assert_eq!(RetryHandler::backoff(&config, 50), Duration::from_millis(6_400));
        assert!(RetryHandler::backoff(&OrchestratorConfig::default(), 3).is_zero());
    }
}

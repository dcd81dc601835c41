use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of every failure the router and orchestrator can surface.
///
/// Carried on [`InvocationResult`](crate::invocation::InvocationResult) and on
/// failed runs so callers can react without parsing payload text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[error("malformed decision")]
    MalformedDecision,

    #[error("capability not found")]
    CapabilityNotFound,

    #[error("handler execution error")]
    HandlerExecutionError,

    #[error("timeout")]
    Timeout,

    #[error("invalid navigation choice")]
    NavigationInvalidChoice,

    #[error("workflow step exhausted retries")]
    WorkflowStepExhaustedRetries,
}

impl ErrorKind {
    /// Whether a step that produced this error may be re-attempted.
    ///
    /// Only handler failures and timeouts are retryable; malformed decisions
    /// and unknown capabilities become step output instead.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::HandlerExecutionError | ErrorKind::Timeout)
    }
}

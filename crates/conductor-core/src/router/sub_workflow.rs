//! The seam through which intent-based calls run a capability's own workflow.
//!
//! The router never depends on the orchestrator type; the orchestrator hands
//! itself in as a `SubWorkflowRunner` when a step routes a decision.

use futures_util::future::BoxFuture;

/// Errors from running a sub-workflow.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubWorkflowError {
    #[error("workflow '{0}' is not registered")]
    NotFound(String),

    #[error("sub-workflow depth {depth} exceeds maximum {max}")]
    DepthExceeded { depth: u32, max: u32 },

    #[error("{0}")]
    Failed(String),
}

/// Runs a workflow to completion and returns its terminal output.
pub trait SubWorkflowRunner: Send + Sync {
    fn run_sub_workflow<'a>(
        &'a self,
        workflow_id: &'a str,
        user_input: String,
    ) -> BoxFuture<'a, Result<String, SubWorkflowError>>;
}

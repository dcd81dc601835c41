//! The `Agent` trait: one synchronous chat call per step.
//!
//! Streaming, tool negotiation and provider selection all live inside the
//! implementation; the orchestrator only sees text in and text out.

use std::future::Future;

/// Errors returned by an agent chat call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("agent refused: {0}")]
    Refused(String),

    #[error("{0}")]
    Other(String),
}

/// A conversational agent.
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Send one input and wait for the full reply.
    fn chat(&self, input: &str) -> impl Future<Output = Result<String, AgentError>> + Send;
}

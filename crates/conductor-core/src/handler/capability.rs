//! The `Handler` trait: a tool, retriever or plugin addressable by id.
//!
//! Uses RPITIT for `invoke`. For dynamic dispatch wrap implementations in
//! [`BoxHandler`](super::BoxHandler).

use std::future::Future;

use conductor_types::handler::HandlerKind;
use serde_json::Value;

/// Errors raised by a handler invocation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Failed(String),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// A capability the router can invoke.
///
/// Handlers are owned by the registry and shared read-only; `invoke` must not
/// block the async runtime (wrap blocking work in `spawn_blocking`) or the
/// router's timeout cannot fire.
pub trait Handler: Send + Sync {
    /// Stable capability id.
    fn id(&self) -> &str;

    fn kind(&self) -> HandlerKind;

    /// Whether calls leave the process (HTTP, RPC, ...).
    fn is_remote(&self) -> bool {
        false
    }

    fn endpoint(&self) -> Option<&str> {
        None
    }

    /// Workflow that serves intent-based calls to this capability.
    fn sub_workflow_id(&self) -> Option<&str> {
        None
    }

    /// Invoke `method` with `params`.
    fn invoke(
        &self,
        method: &str,
        params: &Value,
    ) -> impl Future<Output = Result<Value, HandlerError>> + Send;
}

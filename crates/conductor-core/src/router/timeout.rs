//! TimeoutExecutor -- one handler invocation under a hard wall-clock bound.
//!
//! The handler future is dropped when the deadline passes, so the call is
//! abandoned at its next await point. Panics inside the handler are captured
//! and reported as errors instead of unwinding through the router.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::Value;

use crate::handler::{BoxHandler, HandlerError};

/// The three ways a bounded invocation can end.
#[derive(Debug)]
pub enum ExecutionOutcome {
    Completed(Value),
    TimedOut,
    Raised(HandlerError),
}

/// Stateless executor; all methods are associated functions.
pub struct TimeoutExecutor;

impl TimeoutExecutor {
    /// Invoke `handler` with `method` and `params`, waiting at most `timeout`.
    pub async fn run(
        handler: &BoxHandler,
        method: &str,
        params: &Value,
        timeout: Duration,
    ) -> ExecutionOutcome {
        let call = AssertUnwindSafe(handler.invoke(method, params)).catch_unwind();

        match tokio::time::timeout(timeout, call).await {
            Err(_elapsed) => ExecutionOutcome::TimedOut,
            Ok(Err(panic)) => ExecutionOutcome::Raised(HandlerError::Panicked(panic_message(
                panic.as_ref(),
            ))),
            Ok(Ok(Ok(value))) => ExecutionOutcome::Completed(value),
            Ok(Ok(Err(e))) => ExecutionOutcome::Raised(e),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

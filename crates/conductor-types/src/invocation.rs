//! Invocation results returned by the action router.
//!
//! Status codes are part of the observable contract and are stable:
//! 200 (no action), 201 (handled), 400 (bad decision), 404 (capability not
//! found), 500 (handler error or timeout).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorKind;

/// No action was requested; the decision is passed through unchanged.
pub const STATUS_NO_ACTION: u16 = 200;
/// A handler (or sub-workflow) executed successfully.
pub const STATUS_HANDLED: u16 = 201;
/// The decision was malformed.
pub const STATUS_BAD_DECISION: u16 = 400;
/// No handler is registered under the requested capability id.
pub const STATUS_NOT_FOUND: u16 = 404;
/// The handler raised or timed out.
pub const STATUS_HANDLER_ERROR: u16 = 500;

/// Payload text used when an action exceeds its timeout.
pub const TIMEOUT_MESSAGE: &str = "The action timed out.";

/// Outcome of routing one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub status_code: u16,
    /// Rendered handler output, an error message, or (for pass-through) the
    /// original decision.
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl InvocationResult {
    /// Pass-through result for an empty decision.
    pub fn no_action(decision: Value) -> Self {
        Self {
            status_code: STATUS_NO_ACTION,
            payload: decision,
            error_kind: None,
        }
    }

    /// Successful execution; `output` is rendered to text.
    pub fn handled(output: &Value) -> Self {
        Self {
            status_code: STATUS_HANDLED,
            payload: Value::String(render_payload(output)),
            error_kind: None,
        }
    }

    pub fn bad_decision(reason: impl Into<String>) -> Self {
        Self {
            status_code: STATUS_BAD_DECISION,
            payload: Value::String(reason.into()),
            error_kind: Some(ErrorKind::MalformedDecision),
        }
    }

    /// Capability lookup miss, with the canonical `"{cap} '{method}' not found."` text.
    pub fn not_found(capability_id: &str, method: &str) -> Self {
        Self {
            status_code: STATUS_NOT_FOUND,
            payload: Value::String(format!("{capability_id} '{method}' not found.")),
            error_kind: Some(ErrorKind::CapabilityNotFound),
        }
    }

    /// Handler failure. The message is prefixed with `[ERROR]`.
    pub fn handler_error(message: impl AsRef<str>) -> Self {
        Self {
            status_code: STATUS_HANDLER_ERROR,
            payload: Value::String(format!("[ERROR] {}", message.as_ref())),
            error_kind: Some(ErrorKind::HandlerExecutionError),
        }
    }

    pub fn timed_out() -> Self {
        Self {
            status_code: STATUS_HANDLER_ERROR,
            payload: Value::String(TIMEOUT_MESSAGE.to_string()),
            error_kind: Some(ErrorKind::Timeout),
        }
    }

    /// Whether the status is 200 or 201.
    pub fn is_success(&self) -> bool {
        matches!(self.status_code, STATUS_NO_ACTION | STATUS_HANDLED)
    }

    /// The payload as display text.
    pub fn payload_text(&self) -> String {
        render_payload(&self.payload)
    }

    /// Combine per-action results of a multi-action decision.
    ///
    /// Status is the first status outside {200, 201}; otherwise 201 if any
    /// action was handled, else 200. Payloads are joined by a blank line in
    /// input order.
    pub fn combine(results: Vec<InvocationResult>) -> Self {
        let failure = results.iter().find(|r| !r.is_success());
        let (status_code, error_kind) = match failure {
            Some(r) => (r.status_code, r.error_kind),
            None if results.iter().any(|r| r.status_code == STATUS_HANDLED) => {
                (STATUS_HANDLED, None)
            }
            None => (STATUS_NO_ACTION, None),
        };

        let payload = results
            .iter()
            .map(InvocationResult::payload_text)
            .collect::<Vec<_>>()
            .join("\n\n");

        Self {
            status_code,
            payload: Value::String(payload),
            error_kind,
        }
    }
}

/// Render a JSON value as payload text: strings verbatim, everything else as
/// compact JSON.
pub fn render_payload(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

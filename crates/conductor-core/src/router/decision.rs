//! Decision parsing.
//!
//! Agents emit decisions in one of three JSON shapes:
//!
//! ```json
//! {"tool": "github", "method": "read_file", "params": {"path": "/tmp/x"}}
//! {"tool": "github", "intent": "create an issue", "context": "repo: foo"}
//! {"github": {"method": "read_file", "params": {"path": "/tmp/x"}},
//!  "docs":   {"intent": "find the install guide", "context": ""}}
//! ```
//!
//! The first two are single calls (the capability id may also be given as
//! `capability_id`); the last is a keyed batch where each entry is handled
//! independently. A decision may also arrive as a JSON-encoded string.

use serde_json::{Map, Value};

use conductor_types::invocation::render_payload;

/// Keys that mark an object as a single flat call rather than a keyed batch.
const FLAT_KEYS: [&str; 4] = ["tool", "capability_id", "method", "intent"];

/// Why a decision (or one batch entry) was rejected.
///
/// The display strings are returned verbatim as 400 payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    #[error("invalid input type")]
    InvalidInputType,

    #[error("missing tool field")]
    MissingTool,

    #[error("must have either intent or method field")]
    MissingIntentOrMethod,
}

/// How a capability is to be invoked.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// Explicit method and params, executed by the handler itself.
    Method { method: String, params: Value },
    /// Natural-language intent, served by the handler's sub-workflow.
    Intent { intent: String, context: String },
}

impl Call {
    /// Method name or intent text, used in log fields and 404 messages.
    pub fn label(&self) -> &str {
        match self {
            Call::Method { method, .. } => method,
            Call::Intent { intent, .. } => intent,
        }
    }
}

/// A single call against one capability.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub capability_id: String,
    pub call: Call,
}

/// One entry of a keyed batch. Malformed entries keep their error so the
/// remaining entries still run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub capability_id: String,
    pub call: Result<Call, DecisionError>,
}

/// A classified decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Nothing to do; the decision is passed through.
    Empty,
    Single(Action),
    Batch(Vec<BatchEntry>),
}

impl Decision {
    /// Classify a raw decision value.
    pub fn parse(raw: &Value) -> Result<Self, DecisionError> {
        match raw {
            Value::Null => Ok(Decision::Empty),
            Value::String(s) if s.trim().is_empty() => Ok(Decision::Empty),
            Value::String(s) => {
                let parsed: Value =
                    serde_json::from_str(s).map_err(|_| DecisionError::InvalidInputType)?;
                match parsed {
                    Value::Object(map) => Self::parse_object(&map),
                    _ => Err(DecisionError::InvalidInputType),
                }
            }
            Value::Object(map) => Self::parse_object(map),
            _ => Err(DecisionError::InvalidInputType),
        }
    }

    fn parse_object(map: &Map<String, Value>) -> Result<Self, DecisionError> {
        if map.is_empty() {
            return Ok(Decision::Empty);
        }

        if FLAT_KEYS.iter().any(|key| map.contains_key(*key)) {
            let capability_id = map
                .get("tool")
                .or_else(|| map.get("capability_id"))
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .ok_or(DecisionError::MissingTool)?;
            let call = parse_call(map)?;
            return Ok(Decision::Single(Action {
                capability_id: capability_id.to_string(),
                call,
            }));
        }

        let entries = map
            .iter()
            .map(|(capability_id, body)| BatchEntry {
                capability_id: capability_id.clone(),
                call: match body {
                    Value::Object(inner) => parse_call(inner),
                    _ => Err(DecisionError::InvalidInputType),
                },
            })
            .collect();
        Ok(Decision::Batch(entries))
    }
}

/// Extract the call from an object carrying `intent` or `method`.
///
/// `intent` wins when both are present.
fn parse_call(map: &Map<String, Value>) -> Result<Call, DecisionError> {
    if let Some(intent) = map.get("intent").and_then(Value::as_str) {
        let context = match map.get("context") {
            None | Some(Value::Null) => String::new(),
            Some(value) => render_payload(value),
        };
        return Ok(Call::Intent {
            intent: intent.to_string(),
            context,
        });
    }

    if let Some(method) = map.get("method").and_then(Value::as_str) {
        let params = match map.get("params") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(value) => value.clone(),
        };
        return Ok(Call::Method {
            method: method.to_string(),
            params,
        });
    }

    Err(DecisionError::MissingIntentOrMethod)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_values_pass_through() {
        assert_eq!(Decision::parse(&Value::Null).unwrap(), Decision::Empty);
        assert_eq!(Decision::parse(&json!("")).unwrap(), Decision::Empty);
        assert_eq!(Decision::parse(&json!("  ")).unwrap(), Decision::Empty);
        assert_eq!(Decision::parse(&json!({})).unwrap(), Decision::Empty);
    }

    #[test]
    fn test_unrecognized_shapes_rejected() {
        for raw in [json!(42), json!(true), json!(["a"]), json!("not json"), json!("[1]")] {
            assert_eq!(Decision::parse(&raw), Err(DecisionError::InvalidInputType));
        }
    }

    #[test]
    fn test_flat_direct_call() {
        let decision = Decision::parse(&json!({
            "tool": "fs",
            "method": "read_file",
            "params": {"path": "/tmp/x"}
        }))
        .unwrap();
        assert_eq!(
            decision,
            Decision::Single(Action {
                capability_id: "fs".to_string(),
                call: Call::Method {
                    method: "read_file".to_string(),
                    params: json!({"path": "/tmp/x"}),
                },
            })
        );
    }

    #[test]
    fn test_flat_call_from_json_string() {
        let raw = json!(r#"{"capability_id": "fs", "method": "list"}"#);
        let Decision::Single(action) = Decision::parse(&raw).unwrap() else {
            panic!("expected single call");
        };
        assert_eq!(action.capability_id, "fs");
        assert_eq!(
            action.call,
            Call::Method {
                method: "list".to_string(),
                params: json!({}),
            }
        );
    }

    #[test]
    fn test_intent_wins_over_method() {
        let Decision::Single(action) = Decision::parse(&json!({
            "tool": "github",
            "intent": "create an issue",
            "method": "create_issue",
            "context": {"repo": "foo"}
        }))
        .unwrap() else {
            panic!("expected single call");
        };
        assert_eq!(
            action.call,
            Call::Intent {
                intent: "create an issue".to_string(),
                context: r#"{"repo":"foo"}"#.to_string(),
            }
        );
    }

    #[test]
    fn test_missing_tool() {
        let err = Decision::parse(&json!({"method": "read_file"})).unwrap_err();
        assert_eq!(err, DecisionError::MissingTool);
        assert_eq!(err.to_string(), "missing tool field");
    }

    #[test]
    fn test_missing_intent_and_method() {
        let err = Decision::parse(&json!({"tool": "fs", "params": {"a": 1}, "extra": true}))
            .unwrap_err();
        assert_eq!(err.to_string(), "must have either intent or method field");
    }

    #[test]
    fn test_keyed_batch_keeps_bad_entries() {
        let Decision::Batch(entries) = Decision::parse(&json!({
            "fs": {"method": "read_file", "params": {"path": "a"}},
            "docs": {"params": {}},
            "web": "search"
        }))
        .unwrap() else {
            panic!("expected batch");
        };
        assert_eq!(entries.len(), 3);

        let by_id = |id: &str| entries.iter().find(|e| e.capability_id == id).unwrap();
        assert!(by_id("fs").call.is_ok());
        assert_eq!(by_id("docs").call, Err(DecisionError::MissingIntentOrMethod));
        assert_eq!(by_id("web").call, Err(DecisionError::InvalidInputType));
    }

    #[test]
    fn test_keyed_batch_keeps_input_order() {
        let raw = r#"{"zeta": {"method": "go"}, "missing": {"method": "q"}, "alpha": {"method": "x"}}"#;
        for decision in [serde_json::from_str::<Value>(raw).unwrap(), Value::String(raw.to_string())] {
            let Decision::Batch(entries) = Decision::parse(&decision).unwrap() else {
                panic!("expected batch");
            };
            let ids: Vec<&str> = entries.iter().map(|e| e.capability_id.as_str()).collect();
            assert_eq!(ids, vec!["zeta", "missing", "alpha"]);
        }
    }
}

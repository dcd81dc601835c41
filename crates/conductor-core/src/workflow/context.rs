//! Per-run execution context and `${context.…}` interpolation.
//!
//! `ExecutionContext` holds the user input, the append-only step output map
//! and custom variables of a single run. Templates reference it with tokens
//! such as `${context.user_input}`, `${context.step_outputs.fetch}` or
//! `${context.variables.ticket.priority}`.

use std::collections::{BTreeMap, HashMap};

use conductor_types::config::UnresolvedPolicy;
use conductor_types::invocation::render_payload;
use conductor_types::workflow::NavigationRecord;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum size of a single step output (1 MB).
pub const MAX_STEP_OUTPUT_SIZE: usize = 1_048_576;

const TOKEN_OPEN: &str = "${context.";
const TOKEN_CLOSE: char = '}';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("output for step '{0}' was already recorded")]
    OutputAlreadyRecorded(String),

    #[error("unresolved context path '{0}'")]
    UnresolvedPath(String),
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub user_input: String,
    /// Written at most once per step id.
    pub step_outputs: BTreeMap<String, String>,
    pub variables: HashMap<String, Value>,
    /// Audit trail of navigation decisions, in decision order.
    #[serde(default)]
    pub navigation_log: Vec<NavigationRecord>,
}

impl ExecutionContext {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            ..Self::default()
        }
    }

    pub fn with_variables(mut self, variables: HashMap<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    /// Record a step's output.
    ///
    /// Outputs above [`MAX_STEP_OUTPUT_SIZE`] are replaced by a truncation
    /// marker. Returns the text actually stored.
    pub fn set_step_output(&mut self, step_id: &str, output: String) -> Result<&str, ContextError> {
        if self.step_outputs.contains_key(step_id) {
            return Err(ContextError::OutputAlreadyRecorded(step_id.to_string()));
        }

        let stored = if output.len() > MAX_STEP_OUTPUT_SIZE {
            tracing::warn!(
                step_id,
                size = output.len(),
                max = MAX_STEP_OUTPUT_SIZE,
                "step output exceeds size limit, truncating"
            );
            json!({
                "_truncated": true,
                "_original_size": output.len(),
                "_message": format!("output exceeded {MAX_STEP_OUTPUT_SIZE} byte limit and was truncated"),
            })
            .to_string()
        } else {
            output
        };

        Ok(self
            .step_outputs
            .entry(step_id.to_string())
            .or_insert(stored)
            .as_str())
    }

    pub fn step_output(&self, step_id: &str) -> Option<&str> {
        self.step_outputs.get(step_id).map(String::as_str)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn record_navigation(&mut self, record: NavigationRecord) {
        self.navigation_log.push(record);
    }

    /// Resolve a dotted path such as `step_outputs.fetch.items.0.title`.
    ///
    /// Step outputs that are JSON text are parsed so paths can reach into
    /// them. Arrays are indexed by number.
    pub fn resolve_path(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.').filter(|s| !s.is_empty());
        match segments.next()? {
            "user_input" => {
                let rest: Vec<&str> = segments.collect();
                if rest.is_empty() {
                    Some(Value::String(self.user_input.clone()))
                } else {
                    descend(&parse_text(&self.user_input), &rest)
                }
            }
            "step_outputs" => {
                let Some(step_id) = segments.next() else {
                    return Some(self.step_outputs_value());
                };
                let output = self.step_outputs.get(step_id)?;
                let rest: Vec<&str> = segments.collect();
                if rest.is_empty() {
                    Some(Value::String(output.clone()))
                } else {
                    descend(&parse_text(output), &rest)
                }
            }
            "variables" => {
                let Some(name) = segments.next() else {
                    return Some(json!(self.variables));
                };
                let value = self.variables.get(name)?;
                let rest: Vec<&str> = segments.collect();
                descend(value, &rest)
            }
            _ => None,
        }
    }

    /// Substitute every `${context.<path>}` token in `template`.
    ///
    /// Strings are inserted verbatim and other values as compact JSON.
    /// Unresolved tokens are kept literally under [`UnresolvedPolicy::Keep`].
    pub fn interpolate(&self, template: &str, policy: UnresolvedPolicy) -> Result<String, ContextError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find(TOKEN_OPEN) {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + TOKEN_OPEN.len()..];
            let Some(end) = after_open.find(TOKEN_CLOSE) else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };

            let path = after_open[..end].trim();
            let token = &rest[start..start + TOKEN_OPEN.len() + end + 1];
            match self.resolve_path(path) {
                Some(value) => out.push_str(&render_payload(&value)),
                None => match policy {
                    UnresolvedPolicy::Keep => {
                        tracing::debug!(path, "leaving unresolved context token");
                        out.push_str(token);
                    }
                    UnresolvedPolicy::Error => {
                        return Err(ContextError::UnresolvedPath(path.to_string()));
                    }
                },
            }
            rest = &after_open[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }

    /// JSON object that rule conditions evaluate against.
    ///
    /// Variables are flattened at the root (so `tier == 'gold'` works) and
    /// also available under `variables`, next to `step_outputs` and
    /// `user_input`.
    pub fn to_expression_context(&self) -> Value {
        let mut root = Map::new();
        for (name, value) in &self.variables {
            root.insert(name.clone(), value.clone());
        }
        root.insert("variables".to_string(), json!(self.variables));
        root.insert("step_outputs".to_string(), self.step_outputs_value());
        root.insert("user_input".to_string(), Value::String(self.user_input.clone()));
        Value::Object(root)
    }

    fn step_outputs_value(&self) -> Value {
        Value::Object(
            self.step_outputs
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

/// Parse text as JSON, falling back to a plain string.
pub fn parse_text(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn descend(value: &Value, segments: &[&str]) -> Option<Value> {
    let Some((head, tail)) = segments.split_first() else {
        return Some(value.clone());
    };
    match value {
        Value::Object(map) => descend(map.get(*head)?, tail),
        Value::Array(items) => descend(items.get(head.parse::<usize>().ok()?)?, tail),
        Value::String(s) => match parse_text(s) {
            parsed @ (Value::Object(_) | Value::Array(_)) => descend(&parsed, segments),
            _ => None,
        },
        _ => None,
    }
}

//! JEXL evaluator for navigation rule conditions.
//!
//! Wraps `jexl_eval::Evaluator` with a few string transforms. Context values
//! are always passed as the evaluation context, never spliced into the
//! expression text.

use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression evaluation failed: {0}")]
    EvalFailed(String),

    #[error("invalid context: {0}")]
    InvalidContext(String),
}

/// JEXL evaluator with standard transforms registered.
///
/// Cheap to build; callers create one per decision.
pub struct RuleEvaluator {
    evaluator: jexl_eval::Evaluator<'static>,
}

impl RuleEvaluator {
    pub fn new() -> Self {
        let evaluator = jexl_eval::Evaluator::new()
            .with_transform("lower", |args: &[Value]| {
                Ok(json!(str_arg(args, 0).to_lowercase()))
            })
            .with_transform("upper", |args: &[Value]| {
                Ok(json!(str_arg(args, 0).to_uppercase()))
            })
            .with_transform("trim", |args: &[Value]| Ok(json!(str_arg(args, 0).trim())))
            .with_transform("contains", |args: &[Value]| {
                Ok(json!(str_arg(args, 0).contains(str_arg(args, 1))))
            })
            .with_transform("startsWith", |args: &[Value]| {
                Ok(json!(str_arg(args, 0).starts_with(str_arg(args, 1))))
            })
            .with_transform("length", |args: &[Value]| {
                let len = match args.first() {
                    Some(Value::String(s)) => s.chars().count(),
                    Some(Value::Array(a)) => a.len(),
                    Some(Value::Object(o)) => o.len(),
                    _ => 0,
                };
                Ok(json!(len as f64))
            });

        Self { evaluator }
    }

    /// Evaluate `expression` against `context` (a JSON object) and coerce the
    /// result with JavaScript-like truthiness.
    pub fn evaluate_bool(&self, expression: &str, context: &Value) -> Result<bool, ExpressionError> {
        if !context.is_object() {
            return Err(ExpressionError::InvalidContext(
                "context must be a JSON object".to_string(),
            ));
        }

        let result = self
            .evaluator
            .eval_in_context(expression, context)
            .map_err(|e| ExpressionError::EvalFailed(e.to_string()))?;

        Ok(is_truthy(&result))
    }

    /// Whether every condition holds. An empty list always holds; an
    /// evaluation error counts as false.
    pub fn all_hold(&self, conditions: &[String], context: &Value) -> bool {
        conditions.iter().all(|condition| {
            match self.evaluate_bool(condition, context) {
                Ok(holds) => holds,
                Err(e) => {
                    tracing::warn!(condition = condition.as_str(), error = %e, "rule condition failed to evaluate");
                    false
                }
            }
        })
    }
}

impl Default for RuleEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn str_arg(args: &[Value], index: usize) -> &str {
    args.get(index).and_then(Value::as_str).unwrap_or("")
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_against_root_variables() {
        let eval = RuleEvaluator::new();
        let ctx = json!({"tier": "gold", "score": 0.9});
        assert!(eval.evaluate_bool("tier == 'gold'", &ctx).unwrap());
        assert!(eval.evaluate_bool("score > 0.5", &ctx).unwrap());
        assert!(!eval.evaluate_bool("tier == 'silver'", &ctx).unwrap());
    }

    #[test]
    fn test_nested_access_and_transforms() {
        let eval = RuleEvaluator::new();
        let ctx = json!({
            "step_outputs": {"classify": "  URGENT  "},
            "variables": {"tags": ["a", "b"]}
        });
        assert!(eval
            .evaluate_bool("step_outputs.classify|trim|lower == 'urgent'", &ctx)
            .unwrap());
        assert!(eval.evaluate_bool("variables.tags|length == 2", &ctx).unwrap());
        assert!(eval
            .evaluate_bool("step_outputs.classify|contains('URG')", &ctx)
            .unwrap());
    }

    #[test]
    fn test_truthiness() {
        let eval = RuleEvaluator::new();
        let ctx = json!({"empty": "", "zero": 0.0, "missing_parent": {}});
        assert!(!eval.evaluate_bool("empty", &ctx).unwrap());
        assert!(!eval.evaluate_bool("zero", &ctx).unwrap());
        assert!(!eval.evaluate_bool("missing_parent.x", &ctx).unwrap());
    }

    #[test]
    fn test_all_hold() {
        let eval = RuleEvaluator::new();
        let ctx = json!({"a": 1.0, "b": 2.0});
        assert!(eval.all_hold(&[], &ctx));
        assert!(eval.all_hold(&["a == 1".to_string(), "b == 2".to_string()], &ctx));
        assert!(!eval.all_hold(&["a == 1".to_string(), "b == 3".to_string()], &ctx));
        assert!(!eval.all_hold(&["a ==".to_string()], &ctx));
    }

    #[test]
    fn test_non_object_context_rejected() {
        let eval = RuleEvaluator::new();
        assert!(eval.evaluate_bool("true", &json!([1])).is_err());
    }
}

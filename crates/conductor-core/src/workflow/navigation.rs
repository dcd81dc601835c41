//! NavigationEngine -- picks the next step for steps that declare navigation.
//!
//! Four policies: `manual` trusts the agent's choice when it names an
//! available step, `conditional` takes the first rule whose conditions all
//! hold, `hybrid` tries rules before the agent, and `weighted` samples the
//! candidates proportionally to their weights from an injectable PRNG.

use std::sync::Mutex;

use conductor_types::workflow::{NavigationDecision, NavigationMode, NavigationSpec};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;

use super::context::ExecutionContext;
use super::expression::RuleEvaluator;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NavigationError {
    #[error("{mode} navigation found no valid choice and has no fallback step")]
    NoFallback { mode: NavigationMode },

    #[error("weighted navigation has no candidate steps")]
    NoCandidates,

    #[error("invalid navigation weights: {0}")]
    InvalidWeights(String),
}

// ---------------------------------------------------------------------------
// AgentChoice
// ---------------------------------------------------------------------------

/// The next step an agent picked, parsed from its reply.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentChoice {
    pub step_id: String,
    pub reasoning: Option<String>,
    pub confidence: Option<f64>,
}

impl AgentChoice {
    /// Parse a reply that is either a JSON object
    /// (`{"next_step": "...", "reasoning": "...", "confidence": 0.8}`) or a
    /// bare step id on its first line.
    pub fn parse(reply: &str) -> Option<Self> {
        let body = strip_code_fence(reply.trim());

        if body.starts_with('{') {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
                let step_id = ["next_step", "step", "choice"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str))?
                    .trim()
                    .to_string();
                if step_id.is_empty() {
                    return None;
                }
                return Some(Self {
                    step_id,
                    reasoning: map.get("reasoning").and_then(Value::as_str).map(str::to_string),
                    confidence: map.get("confidence").and_then(Value::as_f64),
                });
            }
        }

        let line = body.lines().map(str::trim).find(|l| !l.is_empty())?;
        let step_id = line
            .trim_end_matches('.')
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .trim_end_matches('.')
            .trim();
        if step_id.is_empty() {
            return None;
        }
        Some(Self {
            step_id: step_id.to_string(),
            reasoning: None,
            confidence: None,
        })
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ---------------------------------------------------------------------------
// NavigationEngine
// ---------------------------------------------------------------------------

pub struct NavigationEngine {
    rng: Mutex<StdRng>,
}

impl NavigationEngine {
    /// Engine seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Engine with a fixed seed, for reproducible weighted picks.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn decide(
        &self,
        spec: &NavigationSpec,
        context: &ExecutionContext,
        choice: Option<&AgentChoice>,
    ) -> Result<NavigationDecision, NavigationError> {
        match spec.mode {
            NavigationMode::Manual => Self::manual(spec, choice),
            NavigationMode::Conditional => match Self::first_matching_rule(spec, context) {
                Some(decision) => Ok(decision),
                None => Self::fallback(spec, "no rule matched; using fallback".to_string()),
            },
            NavigationMode::Hybrid => match Self::first_matching_rule(spec, context) {
                Some(decision) => Ok(decision),
                None => Self::manual(spec, choice),
            },
            NavigationMode::Weighted => self.weighted(spec),
        }
    }

    fn manual(
        spec: &NavigationSpec,
        choice: Option<&AgentChoice>,
    ) -> Result<NavigationDecision, NavigationError> {
        match choice {
            Some(choice) if spec.is_available(&choice.step_id) => {
                let confidence = choice
                    .confidence
                    .filter(|c| c.is_finite())
                    .unwrap_or(1.0)
                    .clamp(0.0, 1.0);
                Ok(NavigationDecision {
                    chosen_step_id: choice.step_id.clone(),
                    reasoning: choice
                        .reasoning
                        .clone()
                        .unwrap_or_else(|| "agent choice".to_string()),
                    confidence,
                })
            }
            Some(choice) => {
                tracing::warn!(
                    choice = choice.step_id.as_str(),
                    "agent chose a step outside the available set"
                );
                Self::fallback(
                    spec,
                    format!(
                        "invalid choice '{}' is not an available step; using fallback",
                        choice.step_id
                    ),
                )
            }
            None => Self::fallback(spec, "agent reported no choice; using fallback".to_string()),
        }
    }

    fn first_matching_rule(
        spec: &NavigationSpec,
        context: &ExecutionContext,
    ) -> Option<NavigationDecision> {
        if spec.rules.is_empty() {
            return None;
        }
        let evaluator = RuleEvaluator::new();
        let expression_context = context.to_expression_context();
        spec.rules
            .iter()
            .find(|rule| evaluator.all_hold(&rule.conditions, &expression_context))
            .map(|rule| NavigationDecision {
                chosen_step_id: rule.target_step.clone(),
                reasoning: "rule matched".to_string(),
                confidence: 1.0,
            })
    }

    fn fallback(spec: &NavigationSpec, reasoning: String) -> Result<NavigationDecision, NavigationError> {
        let step_id = spec
            .fallback_step
            .clone()
            .ok_or(NavigationError::NoFallback { mode: spec.mode })?;
        Ok(NavigationDecision {
            chosen_step_id: step_id,
            reasoning,
            confidence: 0.0,
        })
    }

    fn weighted(&self, spec: &NavigationSpec) -> Result<NavigationDecision, NavigationError> {
        if spec.available_steps.is_empty() {
            return Err(NavigationError::NoCandidates);
        }
        let weights: Vec<f64> = spec
            .available_steps
            .iter()
            .map(|s| s.effective_weight())
            .collect();
        let dist =
            WeightedIndex::new(&weights).map_err(|e| NavigationError::InvalidWeights(e.to_string()))?;
        let total: f64 = weights.iter().sum();

        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            dist.sample(&mut *rng)
        };
        let picked = &spec.available_steps[index];
        Ok(NavigationDecision {
            chosen_step_id: picked.id.clone(),
            reasoning: format!("weighted pick ({} of {total})", weights[index]),
            confidence: weights[index] / total,
        })
    }
}

impl Default for NavigationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NavigationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationEngine").finish_non_exhaustive()
    }
}

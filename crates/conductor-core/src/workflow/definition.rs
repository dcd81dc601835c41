//! Workflow definition parsing, validation, and filesystem discovery.
//!
//! Workflows are authored as YAML and deserialized straight into
//! `WorkflowDefinition`. Every loader validates before returning, so callers
//! only ever see structurally sound step graphs.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use conductor_types::workflow::{NavigationMode, StepKind, USER_EDGE, WorkflowDefinition};
use thiserror::Error;

use super::dag::validate_acyclic;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("cycle detected: {0}")]
    CycleDetected(String),

    /// An edge names a step that does not exist.
    #[error("unknown step: {0}")]
    UnknownStep(String),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse and validate a YAML workflow.
pub fn parse_workflow_yaml(yaml: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let def: WorkflowDefinition =
        serde_yaml_ng::from_str(yaml).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

pub fn serialize_workflow_yaml(def: &WorkflowDefinition) -> Result<String, WorkflowError> {
    serde_yaml_ng::to_string(def).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on a `WorkflowDefinition`.
///
/// Checks:
/// - Non-empty id and at least one step
/// - Unique step ids, none named `user`
/// - The entry step exists
/// - Every step has a target agent or capability
/// - Every output, `on_error` and navigation target exists (`user` is allowed
///   for outputs and navigation)
/// - Fan-in steps carry a `fan_key` with at least one member, one per key
/// - Navigation specs are usable for their mode
/// - The step graph is acyclic
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    if def.id.trim().is_empty() {
        return Err(WorkflowError::ValidationError(
            "workflow id must not be empty".to_string(),
        ));
    }
    if def.steps.is_empty() {
        return Err(WorkflowError::ValidationError(format!(
            "workflow '{}' must have at least one step",
            def.id
        )));
    }

    let mut ids = HashSet::new();
    for step in &def.steps {
        if step.id == USER_EDGE {
            return Err(WorkflowError::ValidationError(format!(
                "'{USER_EDGE}' is reserved and cannot be a step id"
            )));
        }
        if !ids.insert(step.id.as_str()) {
            return Err(WorkflowError::ValidationError(format!(
                "duplicate step ID: '{}'",
                step.id
            )));
        }
    }

    if let Some(entry) = &def.entry {
        if !ids.contains(entry.as_str()) {
            return Err(WorkflowError::UnknownStep(format!(
                "entry step '{entry}' does not exist"
            )));
        }
    }

    let edge_ok = |target: &str| target == USER_EDGE || ids.contains(target);

    for step in &def.steps {
        if step.target.trim().is_empty() {
            return Err(WorkflowError::ValidationError(format!(
                "{} step '{}' has no target",
                step.kind, step.id
            )));
        }

        for output in &step.outputs {
            if !edge_ok(output) {
                return Err(WorkflowError::UnknownStep(format!(
                    "step '{}' outputs to unknown step '{}'",
                    step.id, output
                )));
            }
        }

        if let Some(on_error) = &step.on_error {
            if !ids.contains(on_error.as_str()) {
                return Err(WorkflowError::UnknownStep(format!(
                    "step '{}' on_error names unknown step '{}'",
                    step.id, on_error
                )));
            }
        }

        if step.kind == StepKind::NavigationDecision && step.navigation.is_none() {
            return Err(WorkflowError::ValidationError(format!(
                "navigation_decision step '{}' requires a navigation spec",
                step.id
            )));
        }

        if let Some(nav) = &step.navigation {
            for target in nav.referenced_step_ids() {
                if !edge_ok(target) {
                    return Err(WorkflowError::UnknownStep(format!(
                        "step '{}' navigation references unknown step '{}'",
                        step.id, target
                    )));
                }
            }
            for candidate in &nav.available_steps {
                let weight = candidate.effective_weight();
                if !weight.is_finite() || weight < 0.0 {
                    return Err(WorkflowError::ValidationError(format!(
                        "step '{}' gives candidate '{}' invalid weight {weight}",
                        step.id, candidate.id
                    )));
                }
            }
            match nav.mode {
                NavigationMode::Weighted if nav.available_steps.is_empty() => {
                    return Err(WorkflowError::ValidationError(format!(
                        "weighted navigation on step '{}' needs available steps",
                        step.id
                    )));
                }
                NavigationMode::Manual | NavigationMode::Conditional | NavigationMode::Hybrid
                    if nav.fallback_step.is_none() =>
                {
                    return Err(WorkflowError::ValidationError(format!(
                        "{} navigation on step '{}' needs a fallback_step",
                        nav.mode, step.id
                    )));
                }
                _ => {}
            }
        }
    }

    validate_fan_groups(def)?;
    validate_acyclic(def)
}

fn validate_fan_groups(def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    let mut members: HashMap<&str, usize> = HashMap::new();
    let mut fan_ins: HashMap<&str, &str> = HashMap::new();

    for step in &def.steps {
        match (&step.fan_key, step.is_fan_in) {
            (None, true) => {
                return Err(WorkflowError::ValidationError(format!(
                    "fan-in step '{}' has no fan_key",
                    step.id
                )));
            }
            (Some(key), true) => {
                if let Some(other) = fan_ins.insert(key.as_str(), step.id.as_str()) {
                    return Err(WorkflowError::ValidationError(format!(
                        "fan key '{key}' has two fan-in steps: '{other}' and '{}'",
                        step.id
                    )));
                }
            }
            (Some(key), false) => *members.entry(key.as_str()).or_default() += 1,
            (None, false) => {}
        }
    }

    for (key, fan_in) in fan_ins {
        if !members.contains_key(key) {
            return Err(WorkflowError::ValidationError(format!(
                "fan-in step '{fan_in}' joins fan key '{key}' which has no members"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

pub fn load_workflow_file(path: &Path) -> Result<WorkflowDefinition, WorkflowError> {
    let content = std::fs::read_to_string(path)?;
    parse_workflow_yaml(&content)
}

/// Discover all workflow YAML files directly under `dir`.
///
/// Files that fail to parse or validate are skipped with a warning.
pub fn discover_workflows(dir: &Path) -> Result<Vec<(PathBuf, WorkflowDefinition)>, WorkflowError> {
    let mut results = Vec::new();
    if !dir.exists() {
        return Ok(results);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if !path.is_file() || !is_yaml {
            continue;
        }
        match load_workflow_file(&path) {
            Ok(def) => results.push((path, def)),
            Err(e) => tracing::warn!(?path, error = %e, "skipping invalid workflow file"),
        }
    }
    results.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(results)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

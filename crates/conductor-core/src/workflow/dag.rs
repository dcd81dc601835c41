//! Step graph analysis with `petgraph`.
//!
//! Edges run from a step to every step it can transfer control to: static
//! outputs, its `on_error` step and its navigation targets. The `user` sink is
//! not a node.

use std::collections::{HashMap, HashSet};

use conductor_types::workflow::WorkflowDefinition;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;

use super::definition::WorkflowError;

fn build_graph(def: &WorkflowDefinition) -> (DiGraph<&str, ()>, HashMap<&str, NodeIndex>) {
    let mut graph = DiGraph::<&str, ()>::new();
    let index: HashMap<&str, NodeIndex> = def
        .steps
        .iter()
        .map(|s| (s.id.as_str(), graph.add_node(s.id.as_str())))
        .collect();

    for step in &def.steps {
        let from = index[step.id.as_str()];
        for target in step.successor_ids() {
            if let Some(to) = index.get(target) {
                graph.update_edge(from, *to, ());
            }
        }
    }
    (graph, index)
}

/// Reject step graphs that contain a cycle.
pub fn validate_acyclic(def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    let (graph, _) = build_graph(def);
    toposort(&graph, None).map_err(|cycle| {
        let node_id = graph[cycle.node_id()];
        WorkflowError::CycleDetected(format!("cycle detected involving step '{node_id}'"))
    })?;
    Ok(())
}

/// Steps in topological order (entry-independent).
pub fn topological_order(def: &WorkflowDefinition) -> Result<Vec<&str>, WorkflowError> {
    let (graph, _) = build_graph(def);
    let sorted = toposort(&graph, None).map_err(|cycle| {
        let node_id = graph[cycle.node_id()];
        WorkflowError::CycleDetected(format!("cycle detected involving step '{node_id}'"))
    })?;
    Ok(sorted.into_iter().map(|idx| graph[idx]).collect())
}

/// Steps no edge path from the entry reaches, in definition order.
pub fn unreachable_steps(def: &WorkflowDefinition) -> Vec<&str> {
    let (graph, index) = build_graph(def);
    let Some(entry) = def.entry_step_id().and_then(|id| index.get(id)) else {
        return def.steps.iter().map(|s| s.id.as_str()).collect();
    };

    let mut reached = HashSet::new();
    let mut bfs = Bfs::new(&graph, *entry);
    while let Some(node) = bfs.next(&graph) {
        reached.insert(graph[node]);
    }
    def.steps
        .iter()
        .map(|s| s.id.as_str())
        .filter(|id| !reached.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(steps: serde_json::Value) -> WorkflowDefinition {
        serde_json::from_value(json!({"id": "wf", "steps": steps})).unwrap()
    }

    #[test]
    fn test_linear_graph_is_acyclic() {
        let def = def(json!([
            {"id": "a", "type": "agent", "agent": "x", "outputs": ["b"]},
            {"id": "b", "type": "agent", "agent": "x", "outputs": ["user"]}
        ]));
        assert!(validate_acyclic(&def).is_ok());
        assert_eq!(topological_order(&def).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_cycle_through_on_error() {
        let def = def(json!([
            {"id": "a", "type": "agent", "agent": "x", "outputs": ["b"]},
            {"id": "b", "type": "agent", "agent": "x", "on_error": "a"}
        ]));
        let err = validate_acyclic(&def).unwrap_err();
        assert!(matches!(err, WorkflowError::CycleDetected(_)));
    }

    #[test]
    fn test_cycle_through_navigation() {
        let def = def(json!([
            {"id": "a", "type": "agent", "agent": "x", "outputs": ["b"]},
            {"id": "b", "type": "agent", "agent": "x", "navigation": {
                "mode": "weighted", "available_steps": [{"id": "a"}]
            }}
        ]));
        assert!(validate_acyclic(&def).is_err());
    }

    #[test]
    fn test_unreachable_steps() {
        let def = def(json!([
            {"id": "a", "type": "agent", "agent": "x", "outputs": ["b"]},
            {"id": "b", "type": "agent", "agent": "x"},
            {"id": "orphan", "type": "agent", "agent": "x"}
        ]));
        assert_eq!(unreachable_steps(&def), vec!["orphan"]);
    }
}

//! FanGroupTracker -- readiness gates for fan-in steps.
//!
//! Membership is derived from the definition: every step with a `fan_key`
//! that is not marked `is_fan_in` is a member of that key's group. A group's
//! live state is created on first completion and dropped when its fan-in
//! step finishes. Readiness is signalled through a `watch` channel, so
//! waiters never poll.

use std::collections::{BTreeSet, HashMap};

use conductor_types::workflow::StepDefinition;
use dashmap::DashMap;
use tokio::sync::watch;

#[derive(Debug)]
struct FanGroup {
    completed: BTreeSet<String>,
    ready_tx: watch::Sender<bool>,
}

/// Tracks fan-out completions for one run.
#[derive(Debug, Default)]
pub struct FanGroupTracker {
    expected: HashMap<String, BTreeSet<String>>,
    fan_in: HashMap<String, String>,
    live: DashMap<String, FanGroup>,
}

impl FanGroupTracker {
    pub fn from_steps(steps: &[StepDefinition]) -> Self {
        let mut expected: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut fan_in = HashMap::new();
        for step in steps {
            let Some(key) = &step.fan_key else { continue };
            if step.is_fan_in {
                fan_in.insert(key.clone(), step.id.clone());
            } else {
                expected.entry(key.clone()).or_default().insert(step.id.clone());
            }
        }
        Self {
            expected,
            fan_in,
            live: DashMap::new(),
        }
    }

    /// The fan-in step joining `fan_key`, if any.
    pub fn fan_in_step(&self, fan_key: &str) -> Option<&str> {
        self.fan_in.get(fan_key).map(String::as_str)
    }

    pub fn expected_members(&self, fan_key: &str) -> Option<&BTreeSet<String>> {
        self.expected.get(fan_key)
    }

    /// Record that `step_id` completed. Returns true when this completion
    /// made the group ready.
    pub fn register_completion(&self, fan_key: &str, step_id: &str) -> bool {
        let Some(expected) = self.expected.get(fan_key) else {
            return false;
        };
        if !expected.contains(step_id) {
            tracing::warn!(fan_key, step_id, "completion from step outside fan group ignored");
            return false;
        }

        let mut group = self.live.entry(fan_key.to_string()).or_insert_with(|| FanGroup {
            completed: BTreeSet::new(),
            ready_tx: watch::channel(false).0,
        });
        let was_ready = *group.ready_tx.borrow();
        group.completed.insert(step_id.to_string());
        let now_ready = group.completed.is_superset(expected);
        if now_ready && !was_ready {
            group.ready_tx.send_replace(true);
            tracing::debug!(fan_key, "fan group ready");
            return true;
        }
        false
    }

    /// Whether every member of `fan_key` completed. Once true, stays true
    /// until the group is released.
    pub fn is_ready(&self, fan_key: &str) -> bool {
        self.live.get(fan_key).is_some_and(|group| {
            let ready = *group.ready_tx.borrow();
            ready
        })
    }

    /// Members that have not completed yet, sorted.
    pub fn missing(&self, fan_key: &str) -> Vec<String> {
        let Some(expected) = self.expected.get(fan_key) else {
            return Vec::new();
        };
        match self.live.get(fan_key) {
            Some(group) => expected.difference(&group.completed).cloned().collect(),
            None => expected.iter().cloned().collect(),
        }
    }

    /// Wait until `fan_key` is ready.
    pub async fn wait_ready(&self, fan_key: &str) {
        let mut rx = {
            let group = self.live.entry(fan_key.to_string()).or_insert_with(|| FanGroup {
                completed: BTreeSet::new(),
                ready_tx: watch::channel(false).0,
            });
            group.ready_tx.subscribe()
        };
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Drop the live state of `fan_key` once its fan-in step finished.
    pub fn release(&self, fan_key: &str) {
        if self.live.remove(fan_key).is_some() {
            tracing::debug!(fan_key, "fan group released");
        }
    }
}

//! Event types for the Conductor run event bus.
//!
//! `RunEvent` is broadcast during workflow execution. All variants are
//! Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::NavigationDecision;

/// Events emitted while a workflow run advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: Uuid,
        workflow_id: String,
        depth: u32,
    },

    StepStarted {
        run_id: Uuid,
        step_id: String,
        step_kind: String,
        attempt: u32,
    },

    StepCompleted {
        run_id: Uuid,
        step_id: String,
        duration_ms: u64,
    },

    StepFailed {
        run_id: Uuid,
        step_id: String,
        error: String,
        will_retry: bool,
    },

    /// A fan-in step was reached before all of its siblings completed.
    FanInAwaiting {
        run_id: Uuid,
        fan_key: String,
        step_id: String,
        missing: Vec<String>,
    },

    /// Every sibling of a fan group completed; the fan-in step may run.
    FanInReleased {
        run_id: Uuid,
        fan_key: String,
        step_id: String,
    },

    NavigationDecided {
        run_id: Uuid,
        from_step: String,
        decision: NavigationDecision,
    },

    RunCompleted {
        run_id: Uuid,
        workflow_id: String,
        duration_ms: u64,
        steps_completed: u32,
    },

    RunFailed {
        run_id: Uuid,
        workflow_id: String,
        error: String,
    },

    RunCancelled {
        run_id: Uuid,
        workflow_id: String,
    },
}

impl RunEvent {
    /// The run this event belongs to.
    pub fn run_id(&self) -> Uuid {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::StepStarted { run_id, .. }
            | RunEvent::StepCompleted { run_id, .. }
            | RunEvent::StepFailed { run_id, .. }
            | RunEvent::FanInAwaiting { run_id, .. }
            | RunEvent::FanInReleased { run_id, .. }
            | RunEvent::NavigationDecided { run_id, .. }
            | RunEvent::RunCompleted { run_id, .. }
            | RunEvent::RunFailed { run_id, .. }
            | RunEvent::RunCancelled { run_id, .. } => *run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_event_serde_tagged() {
        let event = RunEvent::StepFailed {
            run_id: Uuid::nil(),
            step_id: "fetch".to_string(),
            error: "timeout".to_string(),
            will_retry: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step_failed");
        assert_eq!(json["will_retry"], true);

        let parsed: RunEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(parsed, RunEvent::StepFailed { will_retry: true, .. }));
    }

    #[test]
    fn test_run_id_accessor() {
        let run_id = Uuid::now_v7();
        let event = RunEvent::FanInReleased {
            run_id,
            fan_key: "G".to_string(),
            step_id: "join".to_string(),
        };
        assert_eq!(event.run_id(), run_id);
    }
}

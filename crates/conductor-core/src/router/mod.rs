//! Action routing: agent decisions in, capability invocations out.
//!
//! - `decision` -- classify a raw decision (empty, single call, keyed batch)
//! - `timeout` -- `TimeoutExecutor`, one handler call under a wall-clock bound
//! - `sub_workflow` -- the seam intent-based calls use to run a workflow
//! - `action_router` -- `ActionRouter`, resolution, dispatch and aggregation

pub mod action_router;
pub mod decision;
pub mod sub_workflow;
pub mod timeout;

pub use action_router::ActionRouter;
pub use decision::{Action, BatchEntry, Call, Decision, DecisionError};
pub use sub_workflow::{SubWorkflowError, SubWorkflowRunner};
pub use timeout::{ExecutionOutcome, TimeoutExecutor};

pub mod context;
pub mod dag;
pub mod definition;
pub mod expression;
pub mod fan_group;
pub mod navigation;
pub mod orchestrator;
pub mod retry;
pub mod step_runner;

pub use context::{ContextError, ExecutionContext};
pub use definition::WorkflowError;
pub use fan_group::FanGroupTracker;
pub use navigation::{AgentChoice, NavigationEngine, NavigationError};
pub use orchestrator::{OrchestratorError, RunHandle, RunInput, RunReport, WorkflowOrchestrator};
pub use step_runner::{StepError, StepRunner};

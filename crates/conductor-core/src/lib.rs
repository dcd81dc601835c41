//! Action routing and workflow orchestration for Conductor.
//!
//! This crate defines the collaborator traits (handlers, agents, handler
//! registries) and the two engines built on them: the [`router::ActionRouter`]
//! that turns agent decisions into capability invocations, and the
//! [`workflow::WorkflowOrchestrator`] that walks step graphs. It depends only
//! on `conductor-types` -- never on `conductor-infra` or any network crate.

pub mod agent;
pub mod event;
pub mod handler;
pub mod router;
pub mod workflow;

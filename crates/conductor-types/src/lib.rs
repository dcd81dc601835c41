//! Shared domain types for Conductor.
//!
//! This crate contains the types exchanged between the action router, the
//! workflow orchestrator and their collaborators: invocation results and
//! error kinds, the step graph, navigation specs, run events and config.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod invocation;
pub mod workflow;

//! Agent collaborators used by `agent` and `navigation_decision` steps.
//!
//! - `chat` -- the `Agent` trait and `AgentError`
//! - `box_agent` -- `BoxAgent`, the type-erased shared agent
//! - `registry` -- name-indexed `AgentRegistry`

pub mod box_agent;
pub mod chat;
pub mod registry;

pub use box_agent::BoxAgent;
pub use chat::{Agent, AgentError};
pub use registry::AgentRegistry;

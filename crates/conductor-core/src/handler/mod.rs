//! Capability handlers and the registry the router resolves them from.
//!
//! - `capability` -- the `Handler` trait (RPITIT) and `HandlerError`
//! - `box_handler` -- `BoxHandler`, the type-erased shared handler
//! - `registry` -- `HandlerRegistry` lookup trait and an in-memory implementation

pub mod box_handler;
pub mod capability;
pub mod registry;

pub use box_handler::BoxHandler;
pub use capability::{Handler, HandlerError};
pub use registry::{HandlerRegistry, InMemoryHandlerRegistry};

//! Infrastructure layer for Conductor.
//!
//! Implements the collaborator traits defined in `conductor-core` against
//! real IO: TOML configuration files and HTTP transport for remote handlers.

pub mod config;
pub mod http_handler;

//! Run event distribution.
//!
//! - `bus` -- `EventBus`, a broadcast channel of `RunEvent`s

pub mod bus;

pub use bus::EventBus;

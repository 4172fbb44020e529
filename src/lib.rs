//! Single-flight Nordic DFU session coordinator.
//!
//! Wraps a platform firmware-update engine with a start/abort/observe
//! contract: at most one update in flight, engine callbacks translated into a
//! fixed vocabulary of states and progress payloads, and exactly one settled
//! outcome per started session.

pub mod commands;
pub mod dfu;
pub mod settings;
pub mod traits;

#[cfg(test)]
mod test_helpers;

pub use commands::dfu::{spawn_dfu_service, spawn_dfu_service_with_policy, DfuServiceHandle};

//! Cooperative, single-threaded engine that drives a registry of
//! [`Stage`]s through the fixed set of USB MITM extension points, and the
//! registry itself.
//!
//! Nothing in this crate owns a socket, a file, or a device: it only
//! defines the hooks stages participate in and the order they run in.
//! Transport, logging, emulation and so on all live in their own crates
//! as [`Stage`] implementations.

mod engine;
mod error;
mod registry;
mod stage;

pub use engine::Engine;
pub use error::EngineError;
pub use registry::StageRegistry;
pub use stage::{Flow, Stage, StageInfo};

#[cfg(test)]
#[path = "tests/engine.rs"]
mod tests;

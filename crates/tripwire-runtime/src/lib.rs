//! Tripwire Runtime - concurrent dataflow execution engine
//!
//! Turns a compiled [`tripwire_compiler::FlowPlan`] into a running network of
//! concurrent stages connected by channels, one stage per compiled node, and
//! drives validated input records through it in lock-step: stages of one
//! record run fully concurrently, but no stage begins the next record before
//! the current one is fully reduced.
//!
//! External collaborators (process execution, SQL execution, detail-record
//! logging) are traits behind bounded pools; their failures surface as
//! classified non-OK results, never as engine errors.

pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod logger;

mod cursor;
mod flow;
mod stage;

pub use config::EngineConfig;
pub use engine::{Collaborators, Engine, EngineStats};
pub use error::RuntimeError;

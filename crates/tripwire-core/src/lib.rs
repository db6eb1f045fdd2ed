//! Tripwire Core - data model for the Tripwire trigger engine
//!
//! This crate provides the fundamental types used across the Tripwire
//! workspace:
//! - Runtime `Value` types
//! - Validated input records and their line grammar
//! - Four-valued truth logic for asynchronously-evaluated predicates
//! - The rule expression tree and its builder
//! - Result types for process and SQL rule invocations

pub mod error;
pub mod record;
pub mod result;
pub mod tree;
pub mod truth;
pub mod types;

// Re-export commonly used types
pub use error::RecordError;
pub use record::InputRecord;
pub use truth::Truth;
pub use types::Value;

//! Tripwire Compiler - static analysis and flow planning
//!
//! Turns a validated [`tripwire_core::tree::Program`] into a [`FlowPlan`]:
//! - symbol table construction (duplicate rule detection)
//! - dependency extraction and topological ordering (cycle and
//!   self-reference rejection)
//! - type checking of comparisons, predicates and argument vectors
//! - demand accounting for fan-out sizing
//!
//! Every failure here is fatal at startup, before any record is processed.

pub mod error;
pub mod order;
pub mod plan;
pub mod symbols;
pub mod typecheck;

pub use error::CompileError;
pub use plan::{compile, FlowPlan};
pub use symbols::SymbolTable;

//! Compiler error types

use thiserror::Error;

/// Compiler error
#[derive(Error, Debug)]
pub enum CompileError {
    /// Two rules share a name
    #[error("duplicate rule definition: {0}")]
    DuplicateRule(String),

    /// A rule's predicate or arguments reference its own outcome
    #[error("rule '{0}' references its own outcome")]
    SelfReference(String),

    /// The dependency graph contains a cycle
    #[error("dependency cycle among rules: {0:?}")]
    Cycle(Vec<String>),

    /// Reference to a rule that is not defined
    #[error("reference to undefined rule: {0}")]
    UndefinedRule(String),

    /// Type error
    #[error("type error: {0}")]
    TypeError(String),

    /// Two argument parts write the same position
    #[error("argument position {position} of rule '{rule}' is written twice")]
    DuplicateArgPosition { rule: String, position: usize },

    /// A declared argument position has no part
    #[error("argument position {position} of rule '{rule}' has no value")]
    MissingArgPosition { rule: String, position: usize },

    /// A declared fan-out branch was never consumed
    #[error("declared fan-out branch never consumed: {0}")]
    UnconsumedBranch(String),

    /// Internal compiler error: a bug, not a configuration problem
    #[error("internal compiler error: {0}")]
    Internal(String),
}

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;

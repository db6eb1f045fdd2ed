//! Runtime error types

use thiserror::Error;
use tripwire_compiler::CompileError;

/// Runtime error
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Invalid engine configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Building the stage network failed
    #[error("flow build error: {0}")]
    Build(#[from] CompileError),

    /// A worker task panicked; the engine cannot continue safely
    #[error("worker failed: {0}")]
    WorkerFailed(String),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

//! External invocation collaborators
//!
//! Invocation stages never talk to the operating system or a database
//! directly; they go through the [`ProcessExecutor`] and [`SqlExecutor`]
//! traits, wrapped in bounded pools. Executor failures are reported inside
//! the outcome types and become classified non-OK results downstream, never
//! engine errors.

mod process;
mod sql;

pub use process::{
    ProcessExecutor, ProcessOutcome, ProcessPool, ProcessStatus, ScriptedProcessExecutor,
    SystemProcessExecutor, OUTPUT_CAP,
};
#[cfg(feature = "sqlx")]
pub use sql::SqlClient;
pub use sql::{QueryOutcome, ScriptedSqlExecutor, SqlExecutor, SqlPool, SqlStatus};

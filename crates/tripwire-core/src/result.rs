//! Rule invocation results
//!
//! Every invocation stage emits exactly one result per cursor, even when the
//! predicate was false (`fired == false`) or unresolved (`unresolved == true`),
//! so the reducer always sees the full rule set for a record.

use crate::tree::ResultProjection;
use crate::types::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Termination classification of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Completed and accepted
    Ok,
    /// Completed but rejected (exit code outside the accepted set, or a
    /// driver error)
    Err,
    /// Terminated by a signal
    Signal,
    /// Never started
    NoStart,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Ok => "ok",
            Classification::Err => "err",
            Classification::Signal => "signal",
            Classification::NoStart => "nostart",
        }
    }
}

/// Outcome of one process invocation for one cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub rule: String,
    pub seq: u64,
    pub started_at: DateTime<Utc>,
    pub classification: Classification,
    /// Exit code, or the signal number for `Signal`
    pub code: i64,
    /// Captured output, capped by the executor
    pub output: String,
    pub wall: Duration,
    pub user: Duration,
    pub system: Duration,
    /// Predicate was unresolved (null); nothing was invoked
    pub unresolved: bool,
    /// Predicate was definitely true and the invocation happened
    pub fired: bool,
}

impl ExecutionResult {
    /// Result synthesized when the predicate is null or the argument vector
    /// is nulled: nothing was invoked.
    pub fn unresolved(rule: &str, seq: u64, at: DateTime<Utc>) -> Self {
        ExecutionResult {
            rule: rule.to_string(),
            seq,
            started_at: at,
            classification: Classification::Ok,
            code: 0,
            output: String::new(),
            wall: Duration::ZERO,
            user: Duration::ZERO,
            system: Duration::ZERO,
            unresolved: true,
            fired: false,
        }
    }

    /// Result synthesized when the predicate is definitely false.
    pub fn not_fired(rule: &str, seq: u64, at: DateTime<Utc>) -> Self {
        ExecutionResult {
            unresolved: false,
            ..Self::unresolved(rule, seq, at)
        }
    }
}

/// Outcome of one SQL invocation for one cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub rule: String,
    pub seq: u64,
    pub started_at: DateTime<Utc>,
    pub classification: Classification,
    /// Five-character state code ("00000" on success)
    pub state: String,
    pub rows_affected: u64,
    /// Elapsed time observed by the invocation stage
    pub wall: Duration,
    /// Elapsed time reported by the driver
    pub query: Duration,
    /// Positional result columns of a row query
    pub columns: Option<Vec<Value>>,
    pub unresolved: bool,
    pub fired: bool,
}

impl QueryResult {
    pub fn unresolved(rule: &str, seq: u64, at: DateTime<Utc>) -> Self {
        QueryResult {
            rule: rule.to_string(),
            seq,
            started_at: at,
            classification: Classification::Ok,
            state: "00000".to_string(),
            rows_affected: 0,
            wall: Duration::ZERO,
            query: Duration::ZERO,
            columns: None,
            unresolved: true,
            fired: false,
        }
    }

    pub fn not_fired(rule: &str, seq: u64, at: DateTime<Utc>) -> Self {
        QueryResult {
            unresolved: false,
            ..Self::unresolved(rule, seq, at)
        }
    }
}

/// Result of one rule for one cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleResult {
    Exec(ExecutionResult),
    Query(QueryResult),
}

impl RuleResult {
    pub fn seq(&self) -> u64 {
        match self {
            RuleResult::Exec(r) => r.seq,
            RuleResult::Query(r) => r.seq,
        }
    }

    pub fn rule(&self) -> &str {
        match self {
            RuleResult::Exec(r) => &r.rule,
            RuleResult::Query(r) => &r.rule,
        }
    }

    pub fn classification(&self) -> Classification {
        match self {
            RuleResult::Exec(r) => r.classification,
            RuleResult::Query(r) => r.classification,
        }
    }

    pub fn fired(&self) -> bool {
        match self {
            RuleResult::Exec(r) => r.fired,
            RuleResult::Query(r) => r.fired,
        }
    }

    pub fn unresolved(&self) -> bool {
        match self {
            RuleResult::Exec(r) => r.unresolved,
            RuleResult::Query(r) => r.unresolved,
        }
    }

    pub fn wall(&self) -> Duration {
        match self {
            RuleResult::Exec(r) => r.wall,
            RuleResult::Query(r) => r.wall,
        }
    }

    /// How the reducer tallies this result: `Some(true)` for ok,
    /// `Some(false)` for fault, `None` when it counts as neither (the rule
    /// did not fire or its predicate was unresolved).
    pub fn counted(&self) -> Option<bool> {
        if !self.fired() || self.unresolved() {
            return None;
        }
        Some(self.classification() == Classification::Ok)
    }

    /// Project a value out of this result. Unresolved and not-fired results
    /// project as null, which is how nulls enter downstream predicates.
    pub fn project(&self, proj: ResultProjection) -> Value {
        if self.unresolved() || !self.fired() {
            return Value::Null;
        }
        match (self, proj) {
            (RuleResult::Exec(r), ResultProjection::ExitCode) => Value::Int(r.code),
            (RuleResult::Exec(r), ResultProjection::Output) => Value::Str(r.output.clone()),
            (_, ResultProjection::Classification) => {
                Value::Str(self.classification().as_str().to_string())
            }
            (RuleResult::Query(r), ResultProjection::RowsAffected) => {
                Value::Uint(r.rows_affected)
            }
            (RuleResult::Query(r), ResultProjection::StateCode) => Value::Str(r.state.clone()),
            (RuleResult::Query(r), ResultProjection::Column(i)) => r
                .columns
                .as_ref()
                .and_then(|cols| cols.get(i).cloned())
                .unwrap_or(Value::Null),
            (result, proj) => {
                panic!("projection {proj:?} is not defined for rule '{}' result kind {result:?}",
                    result.rule())
            }
        }
    }
}

/// Aggregated outcome for one input record, produced exactly once by Reduce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub started_at: DateTime<Utc>,
    pub content_ref: String,
    pub ok_count: u32,
    pub fault_count: u32,
    /// Sum of fired results' wall durations
    pub wall: Duration,
    pub seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec(classification: Classification, fired: bool, unresolved: bool) -> RuleResult {
        RuleResult::Exec(ExecutionResult {
            rule: "r".to_string(),
            seq: 1,
            started_at: Utc::now(),
            classification,
            code: 0,
            output: String::new(),
            wall: Duration::from_millis(5),
            user: Duration::ZERO,
            system: Duration::ZERO,
            unresolved,
            fired,
        })
    }

    #[test]
    fn test_counted() {
        assert_eq!(exec(Classification::Ok, true, false).counted(), Some(true));
        assert_eq!(exec(Classification::Err, true, false).counted(), Some(false));
        assert_eq!(exec(Classification::Signal, true, false).counted(), Some(false));
        // not fired and unresolved count as neither ok nor fault
        assert_eq!(exec(Classification::Ok, false, false).counted(), None);
        assert_eq!(exec(Classification::Ok, false, true).counted(), None);
    }

    #[test]
    fn test_projection_null_for_not_fired() {
        let r = exec(Classification::Ok, false, false);
        assert_eq!(r.project(ResultProjection::ExitCode), Value::Null);
        let r = exec(Classification::Ok, false, true);
        assert_eq!(r.project(ResultProjection::Classification), Value::Null);
    }

    #[test]
    fn test_projections() {
        let mut inner = match exec(Classification::Err, true, false) {
            RuleResult::Exec(r) => r,
            _ => unreachable!(),
        };
        inner.code = 3;
        inner.output = "boom".to_string();
        let r = RuleResult::Exec(inner);
        assert_eq!(r.project(ResultProjection::ExitCode), Value::Int(3));
        assert_eq!(r.project(ResultProjection::Output), Value::Str("boom".into()));
        assert_eq!(
            r.project(ResultProjection::Classification),
            Value::Str("err".into())
        );
    }

    #[test]
    fn test_query_projections() {
        let r = RuleResult::Query(QueryResult {
            rule: "q".to_string(),
            seq: 2,
            started_at: Utc::now(),
            classification: Classification::Ok,
            state: "00000".to_string(),
            rows_affected: 4,
            wall: Duration::ZERO,
            query: Duration::ZERO,
            columns: Some(vec![Value::Int(9), Value::Str("x".into())]),
            unresolved: false,
            fired: true,
        });
        assert_eq!(r.project(ResultProjection::RowsAffected), Value::Uint(4));
        assert_eq!(r.project(ResultProjection::StateCode), Value::Str("00000".into()));
        assert_eq!(r.project(ResultProjection::Column(0)), Value::Int(9));
        assert_eq!(r.project(ResultProjection::Column(5)), Value::Null);
    }
}

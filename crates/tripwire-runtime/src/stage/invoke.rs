//! Invocation stage
//!
//! Consumes the rule's predicate (when declared) and its assembled argument
//! vector, and emits exactly one result per cursor:
//!
//! - predicate True, vector non-null: the pooled executor is invoked and its
//!   outcome classified;
//! - predicate Null, or a nulled vector: an unresolved result is synthesized
//!   and nothing is invoked;
//! - predicate False: a not-fired result is synthesized.

use super::{recv_for, send_for, ArgVector, Rx, Tx};
use crate::cursor::CursorFollower;
use crate::exec::{ProcessPool, ProcessStatus, SqlPool, SqlStatus};
use chrono::{DateTime, Utc};
use std::time::Instant;
use tripwire_core::result::{Classification, ExecutionResult, QueryResult, RuleResult};
use tripwire_core::tree::ColumnType;
use tripwire_core::Truth;

/// What an invocation stage calls when its rule fires
pub(crate) enum RuleInvoker {
    Command {
        path: String,
        accepted: Vec<i32>,
        pool: ProcessPool,
    },
    QueryRow {
        statement: String,
        schema: Vec<ColumnType>,
        pool: SqlPool,
    },
    QueryExec {
        statements: Vec<String>,
        transactional: bool,
        pool: SqlPool,
    },
}

impl RuleInvoker {
    fn is_command(&self) -> bool {
        matches!(self, RuleInvoker::Command { .. })
    }

    async fn fire(
        &self,
        rule: &str,
        seq: u64,
        started_at: DateTime<Utc>,
        argv: &[String],
    ) -> RuleResult {
        let start = Instant::now();
        match self {
            RuleInvoker::Command { path, accepted, pool } => {
                let outcome = pool.run(path, argv).await;
                let (classification, code, output) = match outcome.status {
                    ProcessStatus::Exited(code) => {
                        let accepted = accepted.contains(&code);
                        (
                            if accepted { Classification::Ok } else { Classification::Err },
                            code as i64,
                            outcome.output,
                        )
                    }
                    ProcessStatus::Signaled(sig) => {
                        (Classification::Signal, sig as i64, outcome.output)
                    }
                    ProcessStatus::NoStart(reason) => (Classification::NoStart, 0, reason),
                };
                RuleResult::Exec(ExecutionResult {
                    rule: rule.to_string(),
                    seq,
                    started_at,
                    classification,
                    code,
                    output,
                    wall: start.elapsed(),
                    user: outcome.user,
                    system: outcome.system,
                    unresolved: false,
                    fired: true,
                })
            }
            RuleInvoker::QueryRow { statement, schema, pool } => {
                let outcome = pool.query_row(statement, argv, schema).await;
                query_result(rule, seq, started_at, start, outcome)
            }
            RuleInvoker::QueryExec { statements, transactional, pool } => {
                let outcome = pool.execute(statements, argv, *transactional).await;
                query_result(rule, seq, started_at, start, outcome)
            }
        }
    }

    fn synth_unresolved(&self, rule: &str, seq: u64, at: DateTime<Utc>) -> RuleResult {
        if self.is_command() {
            RuleResult::Exec(ExecutionResult::unresolved(rule, seq, at))
        } else {
            RuleResult::Query(QueryResult::unresolved(rule, seq, at))
        }
    }

    fn synth_not_fired(&self, rule: &str, seq: u64, at: DateTime<Utc>) -> RuleResult {
        if self.is_command() {
            RuleResult::Exec(ExecutionResult::not_fired(rule, seq, at))
        } else {
            RuleResult::Query(QueryResult::not_fired(rule, seq, at))
        }
    }
}

fn query_result(
    rule: &str,
    seq: u64,
    started_at: DateTime<Utc>,
    start: Instant,
    outcome: crate::exec::QueryOutcome,
) -> RuleResult {
    let classification = match outcome.status {
        SqlStatus::Ok => Classification::Ok,
        SqlStatus::Err(_) => Classification::Err,
        SqlStatus::NoStart(_) => Classification::NoStart,
    };
    RuleResult::Query(QueryResult {
        rule: rule.to_string(),
        seq,
        started_at,
        classification,
        state: outcome.state,
        rows_affected: outcome.rows_affected,
        wall: start.elapsed(),
        query: outcome.duration,
        columns: outcome.columns,
        unresolved: false,
        fired: true,
    })
}

pub(crate) async fn run_invoke(
    mut follower: CursorFollower,
    rule: String,
    invoker: RuleInvoker,
    mut predicate: Option<Rx<Truth>>,
    mut args: Rx<ArgVector>,
    out: Tx<RuleResult>,
) {
    while let Some(cursor) = follower.advance().await {
        let truth = match predicate.as_mut() {
            Some(rx) => recv_for(rx, &cursor, "invoke predicate").await,
            None => Truth::True,
        };
        let vector = recv_for(&mut args, &cursor, "invoke args").await;
        let started_at = Utc::now();

        let result = match truth {
            Truth::True => match vector {
                Some(argv) => {
                    tracing::debug!(rule = %rule, seq = cursor.seq, "invoking");
                    invoker.fire(&rule, cursor.seq, started_at, &argv).await
                }
                None => invoker.synth_unresolved(&rule, cursor.seq, started_at),
            },
            Truth::Null => invoker.synth_unresolved(&rule, cursor.seq, started_at),
            Truth::False => invoker.synth_not_fired(&rule, cursor.seq, started_at),
            Truth::Pending => {
                panic!("invoke: pending truth escaped a logic stage (seq {})", cursor.seq)
            }
        };
        send_for(&out, cursor.seq, result, "invoke").await;
    }
}

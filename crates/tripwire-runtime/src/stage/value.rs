//! Constant, projection and comparison stages

use super::{recv_for, send_for, Rx, Tx};
use crate::cursor::CursorFollower;
use tripwire_core::result::RuleResult;
use tripwire_core::tree::{CompareOp, RecordField, ResultProjection};
use tripwire_core::{Truth, Value};

/// Replay one compile-time constant per cursor.
pub(crate) async fn run_const(mut follower: CursorFollower, value: Value, out: Tx<Value>) {
    while let Some(cursor) = follower.advance().await {
        send_for(&out, cursor.seq, value.clone(), "const").await;
    }
}

/// Project one record field per cursor.
pub(crate) async fn run_field(mut follower: CursorFollower, field: RecordField, out: Tx<Value>) {
    while let Some(cursor) = follower.advance().await {
        send_for(&out, cursor.seq, field.extract(&cursor.record), "field").await;
    }
}

/// Project a value out of an upstream rule's result; unresolved and
/// not-fired results project as null.
pub(crate) async fn run_rule_output(
    mut follower: CursorFollower,
    mut input: Rx<RuleResult>,
    proj: ResultProjection,
    out: Tx<Value>,
) {
    while let Some(cursor) = follower.advance().await {
        let result = recv_for(&mut input, &cursor, "rule-output").await;
        send_for(&out, cursor.seq, result.project(proj), "rule-output").await;
    }
}

/// Compare an upstream value against a compile-time constant.
pub(crate) async fn run_compare(
    mut follower: CursorFollower,
    mut input: Rx<Value>,
    op: CompareOp,
    constant: Value,
    out: Tx<Truth>,
) {
    while let Some(cursor) = follower.advance().await {
        let value = recv_for(&mut input, &cursor, "compare").await;
        send_for(&out, cursor.seq, op.eval(&value, &constant), "compare").await;
    }
}

//! Tri-state AND/OR stage
//!
//! Operands arrive asynchronously. The stage receives whichever side arrives
//! first, re-consults the truth table with `Pending` for the missing side,
//! and emits as soon as the table yields a decided value. An operand that was
//! not needed for the decision is still drained for this cursor so it cannot
//! corrupt the next cursor's read.

use super::{recv_for, send_for, Rx, Tx};
use crate::cursor::CursorFollower;
use tripwire_core::tree::LogicOp;
use tripwire_core::Truth;

pub(crate) async fn run_logic(
    mut follower: CursorFollower,
    op: LogicOp,
    mut left: Rx<Truth>,
    mut right: Rx<Truth>,
    out: Tx<Truth>,
) {
    while let Some(cursor) = follower.advance().await {
        let mut left_val: Option<Truth> = None;
        let mut right_val: Option<Truth> = None;
        let mut emitted = false;

        loop {
            let combined = combine(
                op,
                left_val.unwrap_or(Truth::Pending),
                right_val.unwrap_or(Truth::Pending),
            );
            if !emitted && combined.is_decided() {
                send_for(&out, cursor.seq, combined, "logic").await;
                emitted = true;
            }
            if left_val.is_some() && right_val.is_some() {
                break;
            }
            tokio::select! {
                v = recv_for(&mut left, &cursor, "logic left"), if left_val.is_none() => {
                    left_val = Some(v);
                }
                v = recv_for(&mut right, &cursor, "logic right"), if right_val.is_none() => {
                    right_val = Some(v);
                }
            }
        }
        // both operands arrived; the table is decided by construction
        debug_assert!(emitted);
    }
}

fn combine(op: LogicOp, left: Truth, right: Truth) -> Truth {
    match op {
        LogicOp::And => left.and(right),
        LogicOp::Or => left.or(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{bootstrap, Cursor};
    use crate::stage::Sequenced;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tripwire_core::InputRecord;

    fn record() -> Arc<InputRecord> {
        Arc::new(
            InputRecord::parse(
                "2026-08-27T10:15:00.000000001+00:00\tcache01~n1\tget\tblake3:abc\tok\t10\t0.5",
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_false_decides_and_before_peer_arrives() {
        let (mut head, link) = bootstrap();
        let (left_tx, left_rx) = mpsc::channel(4);
        let (right_tx, right_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let follower = crate::cursor::CursorFollower::new(&link);
        let task = tokio::spawn(run_logic(follower, LogicOp::And, left_rx, right_rx, out_tx));

        let (next_head, cursor) = Cursor::chain(1, record());
        head.answer(1, Some(cursor)).await;

        // only the left operand has arrived; FALSE decides the AND
        left_tx
            .send(Sequenced { seq: 1, value: Truth::False })
            .await
            .unwrap();
        let decided = out_rx.recv().await.unwrap();
        assert_eq!(decided.seq, 1);
        assert_eq!(decided.value, Truth::False);

        // the late operand must still be drained before the stage advances
        right_tx
            .send(Sequenced { seq: 1, value: Truth::True })
            .await
            .unwrap();
        next_head.resolve();
        let mut next_head = next_head;
        next_head.answer(1, None).await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_true_and_pending_stays_undecided() {
        let (mut head, link) = bootstrap();
        let (left_tx, left_rx) = mpsc::channel(4);
        let (right_tx, right_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let follower = crate::cursor::CursorFollower::new(&link);
        let task = tokio::spawn(run_logic(follower, LogicOp::And, left_rx, right_rx, out_tx));

        let (next_head, cursor) = Cursor::chain(1, record());
        head.answer(1, Some(cursor)).await;

        left_tx
            .send(Sequenced { seq: 1, value: Truth::True })
            .await
            .unwrap();
        // TRUE alone does not decide an AND
        let early = tokio::time::timeout(Duration::from_millis(50), out_rx.recv()).await;
        assert!(early.is_err(), "AND decided on a single TRUE operand");

        right_tx
            .send(Sequenced { seq: 1, value: Truth::Null })
            .await
            .unwrap();
        assert_eq!(out_rx.recv().await.unwrap().value, Truth::Null);

        next_head.resolve();
        let mut next_head = next_head;
        next_head.answer(1, None).await;
        task.await.unwrap();
    }
}

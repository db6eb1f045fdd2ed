//! Reduce stage
//!
//! Per cursor, collects exactly the declared number of rule results from the
//! fan-in, tallies fired and resolved results as ok or fault, and emits one
//! [`SummaryRecord`]. A result carrying a foreign sequence number is a fatal
//! desynchronization.

use super::{recv_for, Rx};
use crate::cursor::CursorFollower;
use std::time::Duration;
use tokio::sync::mpsc;
use tripwire_core::result::{RuleResult, SummaryRecord};

pub(crate) async fn run_reduce(
    mut follower: CursorFollower,
    mut input: Rx<RuleResult>,
    rule_count: usize,
    summary_tx: mpsc::Sender<SummaryRecord>,
) {
    while let Some(cursor) = follower.advance().await {
        let mut ok_count = 0u32;
        let mut fault_count = 0u32;
        let mut wall = Duration::ZERO;

        for _ in 0..rule_count {
            let result = recv_for(&mut input, &cursor, "reduce").await;
            match result.counted() {
                Some(true) => ok_count += 1,
                Some(false) => fault_count += 1,
                None => {}
            }
            if result.fired() {
                wall += result.wall();
            }
        }

        let summary = SummaryRecord {
            started_at: cursor.started_at,
            content_ref: cursor.record.content_ref.to_string(),
            ok_count,
            fault_count,
            wall,
            seq: cursor.seq,
        };
        if summary_tx.send(summary).await.is_err() {
            panic!("reduce: summary channel closed mid-record (seq {})", cursor.seq);
        }
    }
}

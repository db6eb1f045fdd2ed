//! Detail-logging pass-through stage
//!
//! The extra branch of every rule's fan-out ends here: non-OK outcomes of
//! fired invocations get a detail line, everything is forwarded unchanged
//! into the fan-in feeding Reduce.

use super::{recv_for, send_for, Rx, Tx};
use crate::cursor::CursorFollower;
use crate::logger::RecordLogger;
use std::sync::Arc;
use tripwire_core::result::{Classification, RuleResult};

pub(crate) async fn run_detail(
    mut follower: CursorFollower,
    mut input: Rx<RuleResult>,
    logger: Arc<dyn RecordLogger>,
    out: Tx<RuleResult>,
) {
    while let Some(cursor) = follower.advance().await {
        let result = recv_for(&mut input, &cursor, "detail").await;
        if result.fired() && result.classification() != Classification::Ok {
            match &result {
                RuleResult::Exec(r) => logger.exec_detail(&cursor.record, r),
                RuleResult::Query(r) => logger.query_detail(&cursor.record, r),
            }
        }
        send_for(&out, cursor.seq, result, "detail").await;
    }
}

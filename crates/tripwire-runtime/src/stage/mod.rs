//! Stage combinators
//!
//! One tokio task per compiled node. Every stage holds a
//! [`crate::cursor::CursorFollower`] and loops: advance to the next cursor,
//! consume exactly one item per input channel for it, emit exactly one item
//! per output channel, repeat until the exhaustion sentinel.
//!
//! Channel items carry the cursor's sequence number; a mismatch between an
//! item and the held cursor is a fatal desynchronization and panics rather
//! than producing a silently-wrong summary.

mod args;
mod detail;
mod fanin;
mod fanout;
mod invoke;
mod logic;
mod reduce;
mod value;

pub(crate) use args::run_args;
pub(crate) use detail::run_detail;
pub(crate) use fanin::spawn_fanin;
pub(crate) use fanout::run_fanout;
pub(crate) use invoke::{run_invoke, RuleInvoker};
pub(crate) use logic::run_logic;
pub(crate) use reduce::run_reduce;
pub(crate) use value::{run_compare, run_const, run_field, run_rule_output};

use crate::cursor::Cursor;
use tokio::sync::mpsc;

/// Assembled positional argument vector; `None` when any element was null
pub(crate) type ArgVector = Option<Vec<String>>;

/// One channel item, stamped with its cursor's sequence number
#[derive(Debug, Clone)]
pub(crate) struct Sequenced<T> {
    pub(crate) seq: u64,
    pub(crate) value: T,
}

pub(crate) type Tx<T> = mpsc::Sender<Sequenced<T>>;
pub(crate) type Rx<T> = mpsc::Receiver<Sequenced<T>>;

/// Receive the item for the held cursor, panicking on closure or a sequence
/// mismatch; both are protocol violations, not recoverable conditions.
pub(crate) async fn recv_for<T>(rx: &mut Rx<T>, cursor: &Cursor, stage: &str) -> T {
    let item = match rx.recv().await {
        Some(item) => item,
        None => panic!("{stage}: input closed mid-record (seq {})", cursor.seq),
    };
    if item.seq != cursor.seq {
        panic!(
            "{stage}: sequence desynchronization, item seq {} against cursor seq {}",
            item.seq, cursor.seq
        );
    }
    item.value
}

/// Send one item for the given cursor. Stages outlive their consumers only
/// past exhaustion, so a closed output mid-record is a protocol violation.
pub(crate) async fn send_for<T>(tx: &Tx<T>, seq: u64, value: T, stage: &str) {
    if tx.send(Sequenced { seq, value }).await.is_err() {
        panic!("{stage}: output closed mid-record (seq {seq})");
    }
}

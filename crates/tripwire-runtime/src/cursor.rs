//! Cursor chain: the per-record synchronization backbone
//!
//! Every stage holds a [`CursorFollower`] and loops: obtain the current
//! cursor, process it, obtain the next one. Obtaining the next cursor blocks
//! until the current cursor's resolved gate closes (the worker closes it once
//! the record's summary exists), then registers a one-shot request on the
//! cursor's request channel and blocks for the answer. The worker answers
//! exactly `confluence` requests per cursor, where the confluence count is
//! fixed when the network is built, not inferred at runtime.
//!
//! `None` as an answer is the exhaustion sentinel: the follower's stage closes
//! its outputs and exits without requesting further cursors.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tripwire_core::InputRecord;

type NextRequest = oneshot::Sender<Option<Arc<Cursor>>>;

/// Shared handles a follower needs to advance past a cursor
#[derive(Clone)]
pub(crate) struct CursorLink {
    resolved: watch::Receiver<bool>,
    next_tx: mpsc::Sender<NextRequest>,
}

/// Per-record execution context shared by every stage processing the record
pub(crate) struct Cursor {
    pub(crate) seq: u64,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) record: Arc<InputRecord>,
    link: CursorLink,
}

/// Worker-side end of one cursor: the resolved gate and the request queue
pub(crate) struct ChainHead {
    resolved_tx: watch::Sender<bool>,
    requests: mpsc::Receiver<NextRequest>,
}

/// One stage's handle on the cursor chain
pub(crate) struct CursorFollower {
    link: CursorLink,
}

/// Entry point of a chain: a pre-resolved link every follower starts from.
pub(crate) fn bootstrap() -> (ChainHead, CursorLink) {
    let (resolved_tx, resolved) = watch::channel(true);
    let (next_tx, requests) = mpsc::channel(64);
    (
        ChainHead {
            resolved_tx,
            requests,
        },
        CursorLink { resolved, next_tx },
    )
}

impl Cursor {
    /// Create the cursor for a new record, gate still open downstream of the
    /// previous one (resolved only after its summary is emitted).
    pub(crate) fn chain(seq: u64, record: Arc<InputRecord>) -> (ChainHead, Arc<Cursor>) {
        let (resolved_tx, resolved) = watch::channel(false);
        let (next_tx, requests) = mpsc::channel(64);
        let cursor = Arc::new(Cursor {
            seq,
            started_at: Utc::now(),
            record,
            link: CursorLink { resolved, next_tx },
        });
        (
            ChainHead {
                resolved_tx,
                requests,
            },
            cursor,
        )
    }
}

impl ChainHead {
    /// Answer exactly `confluence` outstanding requests with the next cursor
    /// (or the exhaustion sentinel).
    pub(crate) async fn answer(&mut self, confluence: usize, next: Option<Arc<Cursor>>) {
        for _ in 0..confluence {
            let request = self
                .requests
                .recv()
                .await
                .expect("cursor request channel closed before all stages advanced");
            let _ = request.send(next.clone());
        }
    }

    /// Close the resolved gate: the record's summary exists, followers may
    /// now request the next cursor.
    pub(crate) fn resolve(&self) {
        let _ = self.resolved_tx.send(true);
    }
}

impl CursorFollower {
    pub(crate) fn new(link: &CursorLink) -> Self {
        CursorFollower { link: link.clone() }
    }

    /// Advance to the next cursor; `None` means the source is exhausted.
    pub(crate) async fn advance(&mut self) -> Option<Arc<Cursor>> {
        if self.link.resolved.wait_for(|resolved| *resolved).await.is_err() {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        if self.link.next_tx.send(tx).await.is_err() {
            return None;
        }
        match rx.await {
            Ok(Some(cursor)) => {
                self.link = cursor.link.clone();
                Some(cursor)
            }
            _ => None,
        }
    }
}

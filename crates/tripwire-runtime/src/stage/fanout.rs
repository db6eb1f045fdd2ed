//! Fan-out stage
//!
//! Replicates one stream into N declared branches. Deliveries for one cursor
//! run concurrently so a slow consumer never blocks its siblings; the stage
//! advances only once every branch has accepted the value.

use super::{recv_for, send_for, Rx, Tx};
use crate::cursor::CursorFollower;
use futures::future::join_all;

pub(crate) async fn run_fanout<T: Clone>(
    mut follower: CursorFollower,
    mut input: Rx<T>,
    outs: Vec<Tx<T>>,
) {
    while let Some(cursor) = follower.advance().await {
        let value = recv_for(&mut input, &cursor, "fan-out").await;
        join_all(
            outs.iter()
                .map(|tx| send_for(tx, cursor.seq, value.clone(), "fan-out")),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{bootstrap, Cursor, CursorFollower};
    use crate::stage::Sequenced;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tripwire_core::{InputRecord, Value};

    fn record() -> Arc<InputRecord> {
        Arc::new(
            InputRecord::parse(
                "2026-08-27T10:15:00.000000001+00:00\tcache01~n1\tget\tblake3:abc\tok\t10\t0.5",
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_identical_value_on_every_branch() {
        let branches = 4;
        let (mut head, link) = bootstrap();
        let (in_tx, in_rx) = mpsc::channel(4);
        let mut outs = Vec::new();
        let mut out_rxs = Vec::new();
        for _ in 0..branches {
            let (tx, rx) = mpsc::channel(4);
            outs.push(tx);
            out_rxs.push(rx);
        }
        let follower = CursorFollower::new(&link);
        let task = tokio::spawn(run_fanout(follower, in_rx, outs));

        let (next_head, cursor) = Cursor::chain(1, record());
        head.answer(1, Some(cursor)).await;
        in_tx
            .send(Sequenced { seq: 1, value: Value::Uint(7) })
            .await
            .unwrap();
        for rx in out_rxs.iter_mut() {
            let item = rx.recv().await.unwrap();
            assert_eq!(item.seq, 1);
            assert_eq!(item.value, Value::Uint(7));
        }

        next_head.resolve();
        let mut next_head = next_head;
        next_head.answer(1, None).await;
        task.await.unwrap();
    }
}

//! Fan-in: merge many result streams into one
//!
//! One forwarder task per producer pumps into a shared channel. The merged
//! channel closes only once every producer closed, because each forwarder
//! drops its sender clone on exit. Forwarders carry no cursor follower; the
//! producers and the consumer already pace them.

use super::{Rx, Sequenced, Tx};
use tokio::task::JoinHandle;

pub(crate) fn spawn_fanin<T: Send + 'static>(
    producers: Vec<Rx<T>>,
    out: Tx<T>,
) -> Vec<JoinHandle<()>> {
    producers
        .into_iter()
        .map(|mut rx| {
            let out = out.clone();
            tokio::spawn(async move {
                while let Some(item) = rx.recv().await {
                    if out.send(item).await.is_err() {
                        break;
                    }
                }
            })
        })
        .collect()
}

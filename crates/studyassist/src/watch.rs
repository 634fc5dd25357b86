//! Change observation backing the reactive `fetch_*` streams.
//!
//! Data sources signal a [`ChangeNotifier`] after every mutation; [`observe`]
//! turns a trigger stream plus a query closure into a stream that emits the
//! current result immediately and re-runs the query after every trigger.
//! Every emission is a full current-state replacement, never a delta.

use futures::{Stream, StreamExt};
use std::future::Future;
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Fan-out signal for "something underneath changed, re-query".
#[derive(Debug)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<()>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Signals all current watchers. A notifier with no watchers is fine.
    pub fn notify(&self) {
        let _ = self.tx.send(());
    }

    /// Returns a trigger stream that yields once per change. A watcher that
    /// lags behind coalesces the missed changes into a single trigger.
    pub fn watch(&self) -> impl Stream<Item = ()> {
        let rx = self.tx.subscribe();
        futures::stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => Some(((), rx)),
                Err(broadcast::error::RecvError::Closed) => None,
            }
        })
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits `query()` once up front, then re-evaluates it after every item on
/// `trigger`. Ends when the trigger stream ends.
pub fn observe<S, F, Fut, T>(trigger: S, query: F) -> impl Stream<Item = T>
where
    S: Stream<Item = ()> + Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send,
    T: Send + 'static,
{
    let trigger = Box::pin(trigger);
    futures::stream::unfold(
        (trigger, query, true),
        |(mut trigger, mut query, first)| async move {
            if first {
                let item = query().await;
                return Some((item, (trigger, query, false)));
            }
            match trigger.next().await {
                Some(()) => {
                    let item = query().await;
                    Some((item, (trigger, query, false)))
                }
                None => None,
            }
        },
    )
}

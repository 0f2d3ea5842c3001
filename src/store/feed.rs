//! Change feed fan-out and subscription handles.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::{ChangeEvent, RemoteStore};

/// Events buffered per table before slow subscribers start lagging.
const FEED_CAPACITY: usize = 256;

/// Per-table broadcast channels for change events.
#[derive(Default)]
pub struct ChangeHub {
    channels: Mutex<HashMap<String, broadcast::Sender<ChangeEvent>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, table: &str) -> broadcast::Receiver<ChangeEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(table.to_string())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .subscribe()
    }

    pub fn publish(&self, event: ChangeEvent) {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = channels.get(&event.table) {
            // No live receivers is fine.
            let _ = sender.send(event);
        }
    }
}

/// What a subscription handler is given.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    /// Events were dropped because the handler fell behind. Local copies must
    /// be re-read; delivery continues with events newer than this message.
    Resync { skipped: u64 },
}

/// A live change feed subscription. Dropping it stops the handler.
pub struct Subscription {
    table: String,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Run `handler` for every event on `receiver` until the subscription is dropped.
    pub fn spawn<F, Fut>(
        table: &str,
        mut receiver: broadcast::Receiver<ChangeEvent>,
        mut handler: F,
    ) -> Self
    where
        F: FnMut(FeedMessage) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let feed = table.to_string();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => handler(FeedMessage::Change(event)).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(table = %feed, skipped, "Change feed lagged, resyncing");
                        // The backlog predates the resync; skip it.
                        receiver = receiver.resubscribe();
                        handler(FeedMessage::Resync { skipped }).await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        tracing::debug!(table, "Subscribed to change feed");
        Self {
            table: table.to_string(),
            task,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Explicit teardown; equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!(table = %self.table, "Unsubscribed from change feed");
    }
}

/// Subscribe `handler` to a table's change feed.
pub fn subscribe<F, Fut>(store: &dyn RemoteStore, table: &str, handler: F) -> Subscription
where
    F: FnMut(FeedMessage) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Subscription::spawn(table, store.changes(table), handler)
}

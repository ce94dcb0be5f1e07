//! Realtime change events and subscriptions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::types::record_key;

/// Kind of row-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row-level change pushed by the backend.
///
/// `new` carries the row after an insert or update; `old` carries (at least
/// the key of) the row before an update or delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub new: Option<Value>,
    pub old: Option<Value>,
}

impl ChangeEvent {
    #[must_use]
    pub fn insert(table: &str, new: Value) -> Self {
        Self {
            table: table.to_string(),
            kind: ChangeKind::Insert,
            new: Some(new),
            old: None,
        }
    }

    #[must_use]
    pub fn update(table: &str, new: Value) -> Self {
        Self {
            table: table.to_string(),
            kind: ChangeKind::Update,
            new: Some(new),
            old: None,
        }
    }

    #[must_use]
    pub fn delete(table: &str, old: Value) -> Self {
        Self {
            table: table.to_string(),
            kind: ChangeKind::Delete,
            new: None,
            old: Some(old),
        }
    }

    /// Identifier of the affected row.
    ///
    /// Deletes are keyed by the old row, everything else by the new one.
    #[must_use]
    pub fn key(&self) -> Option<String> {
        let row = match self.kind {
            ChangeKind::Delete => self.old.as_ref(),
            ChangeKind::Insert | ChangeKind::Update => self.new.as_ref(),
        }?;
        record_key(row)
    }
}

/// An open realtime channel for one table.
///
/// Dropping or [closing](Subscription::close) the subscription tears the
/// channel down.
#[derive(Debug)]
pub struct Subscription {
    table: String,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    closer: Option<oneshot::Sender<()>>,
}

impl Subscription {
    /// Wrap a receiver of change events for `table`.
    #[must_use]
    pub fn new(table: &str, events: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self {
            table: table.to_string(),
            events,
            closer: None,
        }
    }

    /// Signal `closer` when the subscription is closed.
    #[must_use]
    pub fn with_closer(mut self, closer: oneshot::Sender<()>) -> Self {
        self.closer = Some(closer);
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Wait for the next change. `None` once the channel is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Unsubscribe.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.events.close();
        if let Some(closer) = self.closer.take() {
            let _ = closer.send(());
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_event_key_follows_kind() {
        let insert = ChangeEvent::insert("orders", json!({"id": 9}));
        assert_eq!(insert.key().as_deref(), Some("9"));

        let delete = ChangeEvent::delete("orders", json!({"id": "x-1"}));
        assert_eq!(delete.key().as_deref(), Some("x-1"));

        let keyless = ChangeEvent::update("orders", json!({"status": "shipped"}));
        assert_eq!(keyless.key(), None);
    }

    #[tokio::test]
    async fn test_close_signals_closer() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let (closer, closed) = oneshot::channel();
        let subscription = Subscription::new("products", rx).with_closer(closer);

        subscription.close();
        assert!(closed.await.is_ok());
    }
}

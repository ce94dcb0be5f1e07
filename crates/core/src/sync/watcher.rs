//! Pumping a realtime feed into a [`LiveCollection`].

use std::future::Future;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::instrument;

use super::{LiveCollection, Record};
use crate::backend::{BackendError, ChangeKind, Realtime, decode_record};

/// Turns an INSERT payload into the record that enters the collection.
///
/// Returning `None` drops the event.
pub trait InsertHook<T>: Send + Sync + 'static {
    fn on_insert(&self, payload: Value) -> impl Future<Output = Option<T>> + Send;
}

/// Trust the pushed row and decode it as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodePayload;

impl<T: Record> InsertHook<T> for DecodePayload {
    async fn on_insert(&self, payload: Value) -> Option<T> {
        decode_record(payload)
            .map_err(|e| tracing::warn!(table = T::TABLE, error = %e, "Dropping invalid insert"))
            .ok()
    }
}

/// Handle on a running subscription.
///
/// Call [`Watch::close`] when the owner of the collection goes away. A handle
/// dropped without closing still stops its task, but logs a warning.
#[derive(Debug)]
pub struct Watch {
    table: &'static str,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Watch {
    #[must_use]
    pub const fn table(&self) -> &'static str {
        self.table
    }

    /// Whether the pump task has exited (closed, or the feed ended).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Unsubscribe and wait for the pump task to exit.
    pub async fn close(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(table = self.table, error = %e, "Realtime pump ended abnormally");
        }
        tracing::debug!(table = self.table, "Realtime watch closed");
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            tracing::warn!(table = self.table, "Realtime watch dropped without close()");
            let _ = stop.send(());
        }
    }
}

/// Keep `collection` in sync with its table, decoding INSERT payloads as is.
///
/// # Errors
///
/// Returns the backend error if the subscription cannot be opened.
pub async fn watch<T, R>(realtime: &R, collection: &LiveCollection<T>) -> Result<Watch, BackendError>
where
    T: Record,
    R: Realtime + ?Sized,
{
    watch_with(realtime, collection, DecodePayload).await
}

/// Keep `collection` in sync with its table, passing INSERT payloads
/// through `hook`.
///
/// Events are applied one at a time in arrival order; a slow hook delays
/// later events rather than reordering them.
///
/// # Errors
///
/// Returns the backend error if the subscription cannot be opened.
#[instrument(skip_all, fields(table = T::TABLE))]
pub async fn watch_with<T, R, H>(
    realtime: &R,
    collection: &LiveCollection<T>,
    hook: H,
) -> Result<Watch, BackendError>
where
    T: Record,
    R: Realtime + ?Sized,
    H: InsertHook<T>,
{
    let mut subscription = realtime.subscribe(T::TABLE).await?;
    let (stop, mut stopped) = oneshot::channel::<()>();
    let collection = collection.clone();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stopped => break,
                event = subscription.next() => {
                    let Some(event) = event else {
                        tracing::debug!(table = T::TABLE, "Realtime feed ended");
                        break;
                    };
                    if event.kind == ChangeKind::Insert {
                        if let Some(payload) = event.new
                            && let Some(record) = hook.on_insert(payload).await
                        {
                            collection.insert(record);
                        }
                    } else {
                        collection.apply_change(&event);
                    }
                }
            }
        }
        subscription.close();
    });

    tracing::debug!("Realtime watch opened");
    Ok(Watch {
        table: T::TABLE,
        stop: Some(stop),
        task: Some(task),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::{ChangeEvent, Tables};
    use crate::models::Product;

    async fn settle(collection: &LiveCollection<Product>, len: usize) {
        let mut changes = collection.changes();
        tokio::time::timeout(Duration::from_secs(2), async {
            while collection.len() != len {
                changes.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_watch_mirrors_remote_writes_until_closed() {
        let backend = MemoryBackend::new();
        let products = LiveCollection::<Product>::new();
        let handle = watch(&backend, &products).await.unwrap();

        backend
            .insert(
                "products",
                json!({"name": "Tee", "price": 64, "category": "Men"}),
            )
            .await
            .unwrap();
        settle(&products, 1).await;

        backend.delete("products", "1").await.unwrap();
        settle(&products, 0).await;

        handle.close().await;
        assert_eq!(backend.subscriber_count("products"), 0);
    }

    /// Drops inserts named "Rejected", decodes the rest.
    struct RejectNamed;

    impl InsertHook<Product> for RejectNamed {
        async fn on_insert(&self, payload: Value) -> Option<Product> {
            if payload["name"] == "Rejected" {
                return None;
            }
            DecodePayload.on_insert(payload).await
        }
    }

    #[tokio::test]
    async fn test_hook_can_drop_inserts() {
        let backend = MemoryBackend::new();
        let products = LiveCollection::<Product>::new();
        let handle = watch_with(&backend, &products, RejectNamed).await.unwrap();

        backend.emit(ChangeEvent::insert(
            "products",
            json!({"id": 5, "name": "Rejected", "price": 64, "category": "Men"}),
        ));
        backend.emit(ChangeEvent::insert(
            "products",
            json!({"id": 6, "name": "Tee", "price": 64, "category": "Men"}),
        ));
        // Events are applied in order, so the first insert has been seen
        settle(&products, 1).await;
        handle.close().await;

        assert!(products.get("5").is_none());
        assert_eq!(products.get("6").unwrap().name, "Tee");
    }

    #[tokio::test]
    async fn test_drop_without_close_stops_pump() {
        let backend = MemoryBackend::new();
        let products = LiveCollection::<Product>::new();
        drop(watch(&backend, &products).await.unwrap());

        tokio::time::timeout(Duration::from_secs(2), async {
            while backend.subscriber_count("products") > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}

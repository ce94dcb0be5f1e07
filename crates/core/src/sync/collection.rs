//! Shared in-memory mirror of a remote table.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tokio::sync::watch;

use super::{Record, merge_fields};
use crate::backend::{ChangeEvent, ChangeKind, decode_record};
use crate::types::record_key;

/// What to do with an INSERT for an identifier already in the collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InsertPolicy {
    /// Always prepend. A repeated INSERT shows the record twice.
    #[default]
    Prepend,
    /// Replace the existing record in place; prepend only unknown records.
    ReplaceById,
}

/// Outcome of applying one change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Replaced,
    Updated,
    Removed,
    /// The change did not touch the collection.
    Ignored,
}

/// Most-recent-first list of records kept in sync with a remote table.
///
/// Cloning returns another handle to the same list. Every mutation bumps a
/// version number observable through [`LiveCollection::changes`].
#[derive(Debug)]
pub struct LiveCollection<T> {
    items: Arc<RwLock<Vec<T>>>,
    version: Arc<watch::Sender<u64>>,
    policy: InsertPolicy,
}

impl<T> Clone for LiveCollection<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            version: Arc::clone(&self.version),
            policy: self.policy,
        }
    }
}

impl<T: Record> Default for LiveCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> LiveCollection<T> {
    /// Empty collection with the default insert policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(InsertPolicy::default())
    }

    #[must_use]
    pub fn with_policy(policy: InsertPolicy) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            version: Arc::new(version),
            policy,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> InsertPolicy {
        self.policy
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Replace the whole list, e.g. after a fetch.
    pub fn replace_all(&self, records: Vec<T>) {
        *self.write() = records;
        self.bump();
    }

    /// Copy of the current list.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.read().clone()
    }

    /// Run `f` against the current list without copying it.
    pub fn with_items<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.read())
    }

    /// Record whose identifier equals `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<T> {
        self.read().iter().find(|r| r.key() == key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Version notifications, bumped on every mutation.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Add a record at the front according to the insert policy.
    pub fn insert(&self, record: T) -> Applied {
        let applied = {
            let mut items = self.write();
            let existing = match self.policy {
                InsertPolicy::Prepend => None,
                InsertPolicy::ReplaceById => items.iter().position(|r| r.key() == record.key()),
            };
            match existing.and_then(|i| items.get_mut(i)) {
                Some(slot) => {
                    *slot = record;
                    Applied::Replaced
                }
                None => {
                    items.insert(0, record);
                    Applied::Inserted
                }
            }
        };
        self.bump();
        applied
    }

    /// Merge `fields` over the record with the same identifier.
    ///
    /// Unknown identifiers are ignored. A merge that would produce an
    /// invalid record is dropped with a warning.
    pub fn merge(&self, fields: &Value) -> Applied {
        let Some(key) = record_key(fields) else {
            tracing::warn!(table = T::TABLE, "Update without identifier");
            return Applied::Ignored;
        };

        let applied = {
            let mut items = self.write();
            let Some(slot) = items.iter_mut().find(|r| r.key() == key) else {
                return Applied::Ignored;
            };
            let merged = serde_json::to_value(&*slot)
                .map_err(crate::backend::BackendError::from)
                .and_then(|mut current| {
                    merge_fields(&mut current, fields);
                    decode_record::<T>(current)
                });
            match merged {
                Ok(record) => {
                    *slot = record;
                    Applied::Updated
                }
                Err(e) => {
                    tracing::warn!(table = T::TABLE, key = %key, error = %e, "Dropping invalid update");
                    Applied::Ignored
                }
            }
        };
        if applied != Applied::Ignored {
            self.bump();
        }
        applied
    }

    /// Remove the record whose identifier equals `key`.
    pub fn remove(&self, key: &str) -> Applied {
        let removed = {
            let mut items = self.write();
            let before = items.len();
            items.retain(|r| r.key() != key);
            items.len() != before
        };
        if removed {
            self.bump();
            Applied::Removed
        } else {
            Applied::Ignored
        }
    }

    /// Apply one change event, decoding INSERT payloads directly.
    pub fn apply(&self, event: &ChangeEvent) -> Applied {
        match event.kind {
            ChangeKind::Insert => match event.new.clone().map(decode_record::<T>) {
                Some(Ok(record)) => self.insert(record),
                Some(Err(e)) => {
                    tracing::warn!(table = T::TABLE, error = %e, "Dropping invalid insert");
                    Applied::Ignored
                }
                None => Applied::Ignored,
            },
            ChangeKind::Update | ChangeKind::Delete => self.apply_change(event),
        }
    }

    /// Apply an UPDATE or DELETE event. INSERTs are left to the caller.
    pub(crate) fn apply_change(&self, event: &ChangeEvent) -> Applied {
        match event.kind {
            ChangeKind::Update => event.new.as_ref().map_or(Applied::Ignored, |new| self.merge(new)),
            ChangeKind::Delete => event
                .key()
                .map_or(Applied::Ignored, |key| self.remove(&key)),
            ChangeKind::Insert => Applied::Ignored,
        }
    }
}

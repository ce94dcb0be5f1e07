//! Realtime reconciliation.
//!
//! A [`LiveCollection`] is an in-memory mirror of a remote table. It is
//! filled by an initial fetch and then kept current by applying the table's
//! change events, whether they were caused by this client or another one.
//! [`watch`] connects a collection to a [`Realtime`](crate::backend::Realtime)
//! feed and returns a [`Watch`] handle that must be closed by the caller.

mod collection;
mod watcher;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use collection::{Applied, InsertPolicy, LiveCollection};
pub use watcher::{DecodePayload, InsertHook, Watch, watch, watch_with};

/// A typed row of a remote table.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Remote table the records live in.
    const TABLE: &'static str;

    /// Identifier as text.
    fn key(&self) -> &str;
}

/// Overlay the top-level fields of `patch` onto `base`.
///
/// Fields absent from `patch` are kept. Non-object values leave `base`
/// untouched.
pub fn merge_fields(base: &mut Value, patch: &Value) {
    if let (Value::Object(base), Value::Object(patch)) = (base, patch) {
        for (field, value) in patch {
            base.insert(field.clone(), value.clone());
        }
    }
}

//! In-process backend.
//!
//! Keeps tables, blobs and accounts in memory and pushes change events to
//! subscribers the way the hosted service does. Used by tests and by offline
//! runs of the CLI.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};

use super::{
    AuthProvider, AuthUser, BackendError, BlobStorage, ChangeEvent, Direction, Query, Realtime,
    Subscription, Tables,
};
use crate::types::record_key;

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    next_ids: HashMap<String, i64>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<ChangeEvent>>>,
    blobs: HashMap<(String, String), StoredBlob>,
    accounts: HashMap<String, Account>,
    current: Option<AuthUser>,
    offline: bool,
}

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: AuthUser,
}

/// Backend held entirely in memory.
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    session: Arc<watch::Sender<Option<AuthUser>>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            state: Arc::new(Mutex::new(State::default())),
            session: Arc::new(session),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn online(&self) -> Result<MutexGuard<'_, State>, BackendError> {
        let state = self.lock();
        if state.offline {
            return Err(BackendError::Transport("backend unreachable".to_string()));
        }
        Ok(state)
    }

    /// Replace the contents of `table` without emitting change events.
    ///
    /// Rows without an `id` are given one.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut state = self.lock();
        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            stored.push(state.assign_id(table, row));
        }
        state.tables.insert(table.to_string(), stored);
    }

    /// Snapshot of the rows of `table`, in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Make every remote call fail with [`BackendError::Transport`].
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Register an email/password account.
    pub fn add_account(&self, email: &str, password: &str) -> AuthUser {
        let mut state = self.lock();
        let user = AuthUser {
            id: format!("user-{}", state.accounts.len() + 1),
            email: Some(email.to_string()),
        };
        state.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Drop the current session as if it had expired remotely.
    pub fn expire_session(&self) {
        self.lock().current = None;
        self.session.send_replace(None);
    }

    /// Number of live subscriptions on `table`.
    #[must_use]
    pub fn subscriber_count(&self, table: &str) -> usize {
        self.lock()
            .subscribers
            .get(table)
            .map_or(0, |subs| subs.iter().filter(|tx| !tx.is_closed()).count())
    }

    /// Push `event` to subscribers of its table without touching stored rows.
    pub fn emit(&self, event: ChangeEvent) {
        self.lock().publish(event);
    }

    /// Contents of an uploaded object.
    #[must_use]
    pub fn blob(&self, bucket: &str, name: &str) -> Option<(Vec<u8>, String)> {
        self.lock()
            .blobs
            .get(&(bucket.to_string(), name.to_string()))
            .map(|b| (b.bytes.clone(), b.content_type.clone()))
    }
}

impl State {
    fn assign_id(&mut self, table: &str, row: Value) -> Value {
        let Value::Object(mut fields) = row else {
            return row;
        };

        let highest = self
            .tables
            .get(table)
            .into_iter()
            .flatten()
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .chain(fields.get("id").and_then(Value::as_i64))
            .max()
            .unwrap_or(0);
        let next = self.next_ids.entry(table.to_string()).or_insert(0);
        *next = (*next).max(highest);

        if !fields.contains_key("id") || fields.get("id").is_some_and(Value::is_null) {
            *next += 1;
            fields.insert("id".to_string(), Value::from(*next));
        }
        Value::Object(fields)
    }

    fn publish(&mut self, event: ChangeEvent) {
        if let Some(subs) = self.subscribers.get_mut(&event.table) {
            subs.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare_column(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => text_of(x).cmp(&text_of(y)),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn project(row: &Value, columns: &str) -> Value {
    if columns.trim() == "*" {
        return row.clone();
    }
    let mut out = Map::new();
    for column in columns.split(',').map(str::trim) {
        if let Some(value) = row.get(column) {
            out.insert(column.to_string(), value.clone());
        }
    }
    Value::Object(out)
}

fn is_row(row: &Value, id: &str) -> bool {
    record_key(row).is_some_and(|key| key == id)
}

impl Tables for MemoryBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, BackendError> {
        let state = self.online()?;
        let mut rows: Vec<Value> = state
            .tables
            .get(query.table_name())
            .into_iter()
            .flatten()
            .filter(|row| {
                query.filters().iter().all(|(column, expected)| {
                    row.get(column).is_some_and(|v| text_of(v) == *expected)
                }) && query
                    .non_null_columns()
                    .iter()
                    .all(|column| row.get(column).is_some_and(|v| !v.is_null()))
            })
            .cloned()
            .collect();
        drop(state);

        if let Some((column, direction)) = query.ordering() {
            rows.sort_by(|a, b| {
                let ord = compare_column(a.get(column), b.get(column));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.row_limit() {
            rows.truncate(limit);
        }
        Ok(rows
            .iter()
            .map(|row| project(row, query.columns()))
            .collect())
    }

    async fn insert(&self, table: &str, row: Value) -> Result<(), BackendError> {
        if !row.is_object() {
            return Err(BackendError::Rejected {
                status: 400,
                message: "row must be an object".to_string(),
            });
        }
        let mut state = self.online()?;
        let stored = state.assign_id(table, row);
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(stored.clone());
        state.publish(ChangeEvent::insert(table, stored));
        Ok(())
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<(), BackendError> {
        let Value::Object(patch) = patch else {
            return Err(BackendError::Rejected {
                status: 400,
                message: "patch must be an object".to_string(),
            });
        };
        let mut state = self.online()?;
        let Some(row) = state
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| is_row(row, id)))
        else {
            return Ok(());
        };
        if let Value::Object(fields) = row {
            for (column, value) in patch {
                if column != "id" {
                    fields.insert(column, value);
                }
            }
        }
        let merged = row.clone();
        state.publish(ChangeEvent::update(table, merged));
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), BackendError> {
        let mut state = self.online()?;
        let Some(rows) = state.tables.get_mut(table) else {
            return Ok(());
        };
        let Some(pos) = rows.iter().position(|row| is_row(row, id)) else {
            return Ok(());
        };
        let removed = rows.remove(pos);
        let key = removed.get("id").cloned().unwrap_or(Value::Null);
        state.publish(ChangeEvent::delete(table, serde_json::json!({ "id": key })));
        Ok(())
    }
}

impl Realtime for MemoryBackend {
    async fn subscribe(&self, table: &str) -> Result<Subscription, BackendError> {
        let mut state = self.online()?;
        let (tx, rx) = mpsc::unbounded_channel();
        state
            .subscribers
            .entry(table.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(table, rx))
    }
}

impl BlobStorage for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.online()?;
        state.blobs.insert(
            (bucket.to_string(), name.to_string()),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, name: &str) -> String {
        format!("memory://{bucket}/{name}")
    }
}

impl AuthProvider for MemoryBackend {
    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError> {
        Ok(self.online()?.current.clone())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, BackendError> {
        let mut state = self.online()?;
        let user = state
            .accounts
            .get(email.trim())
            .filter(|account| account.password == password)
            .map(|account| account.user.clone())
            .ok_or(BackendError::InvalidCredentials)?;
        state.current = Some(user.clone());
        drop(state);
        self.session.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.online()?.current = None;
        self.session.send_replace(None);
        Ok(())
    }

    fn session_changes(&self) -> watch::Receiver<Option<AuthUser>> {
        self.session.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::backend::ChangeKind;

    #[tokio::test]
    async fn test_insert_assigns_ids_and_notifies() {
        let backend = MemoryBackend::new();
        backend.seed("orders", vec![json!({"id": 4, "order_number": 100})]);
        let mut sub = backend.subscribe("orders").await.unwrap();

        backend
            .insert("orders", json!({"order_number": 101}))
            .await
            .unwrap();

        let event = sub.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.key().as_deref(), Some("5"));
        assert_eq!(backend.rows("orders").len(), 2);
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_projects() {
        let backend = MemoryBackend::new();
        backend.seed(
            "orders",
            vec![
                json!({"order_number": 101, "deviceId": "a"}),
                json!({"order_number": 103, "deviceId": "b"}),
                json!({"order_number": 102, "deviceId": "a"}),
            ],
        );

        let latest = backend
            .select(
                &Query::table("orders")
                    .select("order_number")
                    .order_by("order_number", Direction::Descending)
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(latest, vec![json!({"order_number": 103})]);

        backend.seed(
            "orders",
            vec![json!({"order_number": 103}), json!({"order_number": null}), json!({})],
        );
        let numbered = backend
            .select(&Query::table("orders").not_null("order_number"))
            .await
            .unwrap();
        assert_eq!(numbered.len(), 1);

        let mine = backend
            .select(&Query::table("orders").eq("deviceId", "a"))
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);
    }

    #[tokio::test]
    async fn test_update_publishes_merged_row_and_delete_publishes_key() {
        let backend = MemoryBackend::new();
        backend.seed("orders", vec![json!({"id": 1, "status": "pending", "total": 50})]);
        let mut sub = backend.subscribe("orders").await.unwrap();

        backend
            .update("orders", "1", json!({"status": "shipped"}))
            .await
            .unwrap();
        let update = sub.next().await.unwrap();
        assert_eq!(update.new, Some(json!({"id": 1, "status": "shipped", "total": 50})));

        backend.delete("orders", "1").await.unwrap();
        let delete = sub.next().await.unwrap();
        assert_eq!(delete.kind, ChangeKind::Delete);
        assert_eq!(delete.old, Some(json!({"id": 1})));
        assert!(backend.rows("orders").is_empty());
    }

    #[tokio::test]
    async fn test_offline_fails_and_closed_subscriptions_are_pruned() {
        let backend = MemoryBackend::new();
        let sub = backend.subscribe("products").await.unwrap();
        assert_eq!(backend.subscriber_count("products"), 1);
        sub.close();
        assert_eq!(backend.subscriber_count("products"), 0);

        backend.set_offline(true);
        let err = backend.select(&Query::table("products")).await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[tokio::test]
    async fn test_password_auth_notifies_session_changes() {
        let backend = MemoryBackend::new();
        backend.add_account("admin@elvora.ma", "s3cret-pass");
        let mut changes = backend.session_changes();

        let err = backend
            .sign_in_with_password("admin@elvora.ma", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::InvalidCredentials);

        let user = backend
            .sign_in_with_password("admin@elvora.ma", "s3cret-pass")
            .await
            .unwrap();
        changes.changed().await.unwrap();
        assert_eq!(changes.borrow_and_update().as_ref(), Some(&user));

        backend.sign_out().await.unwrap();
        assert!(backend.current_user().await.unwrap().is_none());
    }
}

//! The hosted backend contract.
//!
//! The shop talks to a hosted "database-as-a-service": remote tables, a
//! realtime change feed, public blob storage and password auth. Each concern
//! is a trait so the storefront and admin logic can run against the hosted
//! service (see the `elvora-cli` crate) or the in-process
//! [`memory::MemoryBackend`].
//!
//! Trait methods return `impl Future + Send` so callers can move work onto
//! spawned tasks; implementations are free to write them as `async fn`.

pub mod change;
pub mod memory;
mod query;

use std::future::Future;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;

pub use change::{ChangeEvent, ChangeKind, Subscription};
pub use query::{Direction, Query};

/// Errors returned by any backend operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with an error status.
    #[error("Rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// A response or payload did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A referenced record or object does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation needs a signed-in user.
    #[error("Unauthorized")]
    Unauthorized,

    /// Email/password pair was refused.
    #[error("Invalid login credentials")]
    InvalidCredentials,
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// The authenticated back-office user.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Remote tables.
pub trait Tables: Send + Sync {
    /// Run a read query and return the raw rows.
    fn select(&self, query: &Query) -> impl Future<Output = Result<Vec<Value>, BackendError>> + Send;

    /// Insert one row. The backend assigns the `id`.
    fn insert(&self, table: &str, row: Value) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Patch the row whose `id` equals `id` with the fields of `patch`.
    fn update(
        &self,
        table: &str,
        id: &str,
        patch: Value,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Delete the row whose `id` equals `id`.
    fn delete(&self, table: &str, id: &str) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Realtime change feed.
pub trait Realtime: Send + Sync {
    /// Open a channel that receives every insert, update and delete on `table`.
    fn subscribe(&self, table: &str) -> impl Future<Output = Result<Subscription, BackendError>> + Send;
}

/// Public blob storage.
pub trait BlobStorage: Send + Sync {
    /// Store `bytes` as `bucket/name`.
    fn upload(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Public URL of `bucket/name`. Does not check that the object exists.
    fn public_url(&self, bucket: &str, name: &str) -> String;
}

/// Password authentication.
pub trait AuthProvider: Send + Sync {
    /// The user of the persisted session, if it is still valid.
    fn current_user(&self) -> impl Future<Output = Result<Option<AuthUser>, BackendError>> + Send;

    /// Sign in with an email/password pair.
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthUser, BackendError>> + Send;

    /// End the current session.
    fn sign_out(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Notifications of session changes (sign-in, sign-out, expiry).
    fn session_changes(&self) -> watch::Receiver<Option<AuthUser>>;
}

/// Everything the hosted service offers.
pub trait Backend: Tables + Realtime + BlobStorage + AuthProvider {}

impl<T> Backend for T where T: Tables + Realtime + BlobStorage + AuthProvider {}

/// Decode one raw row.
///
/// # Errors
///
/// Returns [`BackendError::Decode`] if the row does not match `T`.
pub fn decode_record<T: DeserializeOwned>(row: Value) -> Result<T, BackendError> {
    Ok(serde_json::from_value(row)?)
}

/// Run `query` and decode every row.
///
/// Rows that fail to decode are skipped with a warning so a single bad
/// record does not blank a whole listing.
///
/// # Errors
///
/// Propagates the backend error of the read itself.
pub async fn fetch_rows<T, B>(tables: &B, query: &Query) -> Result<Vec<T>, BackendError>
where
    T: DeserializeOwned,
    B: Tables + ?Sized,
{
    let rows = tables.select(query).await?;
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match decode_record(row) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(table = query.table_name(), error = %e, "Skipping undecodable row");
            }
        }
    }
    Ok(records)
}

/// Run `query` and decode the first row, if any.
///
/// # Errors
///
/// Propagates the backend error, or [`BackendError::Decode`] if the first
/// row does not match `T`.
pub async fn fetch_one<T, B>(tables: &B, query: &Query) -> Result<Option<T>, BackendError>
where
    T: DeserializeOwned,
    B: Tables + ?Sized,
{
    let rows = tables.select(&query.clone().limit(1)).await?;
    rows.into_iter().next().map(decode_record).transpose()
}

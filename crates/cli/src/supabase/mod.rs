//! Supabase client implementing the Elvora backend contract.
//!
//! One [`SupabaseClient`] talks to every service of a project:
//!
//! - `rest` - `PostgREST` tables under `/rest/v1`
//! - `storage` - public buckets under `/storage/v1`
//! - `auth` - `GoTrue` password sessions under `/auth/v1`
//! - `realtime` - the Phoenix websocket under `/realtime/v1`
//!
//! Requests carry the anon key as `apikey` and, once an admin has signed in,
//! the session's access token as bearer. The session is persisted in the
//! local store so a later run starts signed in.

mod auth;
mod realtime;
mod rest;
mod storage;

use std::sync::Arc;
use std::time::Duration;

use elvora_core::backend::{AuthUser, BackendError};
use elvora_storefront::LocalStore;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{RwLock, watch};
use url::Url;

use auth::Session;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for one Supabase project.
///
/// Cheap to clone; clones share the HTTP connection pool and the session.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base: Url,
    anon_key: SecretString,
    store: Arc<dyn LocalStore>,
    session: RwLock<Option<Session>>,
    user: watch::Sender<Option<AuthUser>>,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base", &self.inner.base.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SupabaseClient {
    /// Create a client for the project at `base`.
    ///
    /// A session persisted in `store` by an earlier run is picked up, but
    /// not validated until [`elvora_core::backend::AuthProvider::current_user`]
    /// is called.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        base: Url,
        anon_key: SecretString,
        store: Arc<dyn LocalStore>,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport)?;

        let session = auth::load_session(store.as_ref());
        let (user, _) = watch::channel(session.as_ref().map(|s| s.user.clone()));

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base,
                anon_key,
                store,
                session: RwLock::new(session),
                user,
            }),
        })
    }

    /// URL of `path` below the project root.
    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.inner
            .base
            .join(path)
            .map_err(|e| BackendError::Transport(format!("invalid endpoint {path}: {e}")))
    }

    fn anon_key(&self) -> &str {
        self.inner.anon_key.expose_secret()
    }

    /// Bearer token for data requests: the session token if signed in,
    /// otherwise the anon key.
    async fn bearer(&self) -> String {
        self.inner.session.read().await.as_ref().map_or_else(
            || self.anon_key().to_string(),
            |session| session.access_token.clone(),
        )
    }

    /// A request to `url` with the project headers set.
    async fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let bearer = self.bearer().await;
        self.inner
            .http
            .request(method, url)
            .header("apikey", self.anon_key())
            .bearer_auth(bearer)
    }
}

/// Map a reqwest failure to a transport error.
fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

/// Pass successful responses through, map the rest to a backend error.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(rejection(status.as_u16(), &body))
}

/// Backend error for an error response.
///
/// Supabase services answer with JSON carrying one of `message`, `msg`,
/// `error_description` or `error`; anything else is passed through as text.
fn rejection(status: u16, body: &str) -> BackendError {
    if status == 401 {
        return BackendError::Unauthorized;
    }
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|field| v.get(field).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string());
    if status == 404 {
        return BackendError::NotFound(message);
    }
    BackendError::Rejected { status, message }
}

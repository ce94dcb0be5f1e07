//! `GoTrue` password sessions.

use elvora_core::backend::{AuthProvider, AuthUser, BackendError};
use elvora_storefront::LocalStore;
use elvora_storefront::storage::keys;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tracing::instrument;

use super::{SupabaseClient, rejection, transport};

/// Seconds before expiry at which an access token is refreshed.
const REFRESH_MARGIN_SECS: i64 = 60;

/// A signed-in session as persisted under [`keys::AUTH_SESSION`].
#[derive(Clone, Serialize, Deserialize)]
pub(super) struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp when the access token expires.
    pub expires_at: i64,
    pub user: AuthUser,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

impl Session {
    fn needs_refresh(&self, now: i64) -> bool {
        now >= self.expires_at - REFRESH_MARGIN_SECS
    }
}

/// Response of the token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at.unwrap_or(now + self.expires_in),
            user: self.user,
        }
    }
}

/// Session persisted by an earlier run. Unreadable sessions are dropped.
pub(super) fn load_session(store: &dyn LocalStore) -> Option<Session> {
    let raw = match store.get(keys::AUTH_SESSION) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read stored session");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unreadable stored session");
            None
        }
    }
}

impl SupabaseClient {
    /// Replace the session, persist it and notify session watchers.
    async fn set_session(&self, session: Option<Session>) {
        let persisted = match &session {
            Some(s) => serde_json::to_string(s)
                .map_err(|e| e.to_string())
                .and_then(|raw| {
                    self.inner
                        .store
                        .set(keys::AUTH_SESSION, &raw)
                        .map_err(|e| e.to_string())
                }),
            None => self
                .inner
                .store
                .remove(keys::AUTH_SESSION)
                .map_err(|e| e.to_string()),
        };
        if let Err(e) = persisted {
            tracing::warn!(error = %e, "Could not persist session");
        }

        let user = session.as_ref().map(|s| s.user.clone());
        *self.inner.session.write().await = session;
        self.inner.user.send_if_modified(|current| {
            if *current == user {
                return false;
            }
            current.clone_from(&user);
            true
        });
    }

    /// Revoke the session behind `access_token`.
    async fn revoke(&self, access_token: String) -> Result<(), BackendError> {
        let url = self.endpoint("/auth/v1/logout")?;
        let response = self
            .inner
            .http
            .post(url)
            .header("apikey", self.anon_key())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        // Already revoked
        if status.is_success() || status == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(rejection(status.as_u16(), &text))
    }

    /// Call the token endpoint with `grant_type` and `body`.
    async fn grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, BackendError> {
        let url = self.endpoint("/auth/v1/token")?;
        let response = self
            .inner
            .http
            .post(url)
            .query(&[("grant_type", grant_type)])
            .header("apikey", self.anon_key())
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status.is_success() {
            let token: TokenResponse = response.json().await.map_err(transport)?;
            return Ok(token.into_session(chrono::Utc::now().timestamp()));
        }
        let text = response.text().await.unwrap_or_default();
        if grant_type == "password" && status == reqwest::StatusCode::BAD_REQUEST {
            return Err(BackendError::InvalidCredentials);
        }
        Err(rejection(status.as_u16(), &text))
    }
}

impl AuthProvider for SupabaseClient {
    #[instrument(skip(self))]
    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError> {
        let Some(session) = self.inner.session.read().await.clone() else {
            return Ok(None);
        };
        if !session.needs_refresh(chrono::Utc::now().timestamp()) {
            return Ok(Some(session.user));
        }

        match self
            .grant("refresh_token", json!({ "refresh_token": session.refresh_token }))
            .await
        {
            Ok(fresh) => {
                let user = fresh.user.clone();
                self.set_session(Some(fresh)).await;
                tracing::debug!("Session refreshed");
                Ok(Some(user))
            }
            Err(e @ BackendError::Transport(_)) => Err(e),
            Err(e) => {
                tracing::info!(error = %e, "Stored session expired");
                self.set_session(None).await;
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, BackendError> {
        let session = self
            .grant(
                "password",
                json!({ "email": email.trim(), "password": password }),
            )
            .await?;
        let user = session.user.clone();
        self.set_session(Some(session)).await;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), BackendError> {
        let token = self
            .inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone());
        let Some(token) = token else {
            self.set_session(None).await;
            return Ok(());
        };

        let result = self.revoke(token).await;
        self.set_session(None).await;
        result
    }

    fn session_changes(&self) -> watch::Receiver<Option<AuthUser>> {
        self.inner.user.subscribe()
    }
}

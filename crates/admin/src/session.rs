//! Admin session and the gate in front of admin views.
//!
//! The session starts out `Loading` until the auth provider has been asked
//! for the persisted session. While loading, the gate makes no decision at
//! all: the caller shows a neutral waiting state and must not redirect, even
//! though the user will probably turn out to be signed out. Once resolved,
//! sign-in and sign-out notifications from the provider keep the state
//! current without another resolution.

use std::sync::Arc;

use elvora_core::backend::{AuthProvider, AuthUser};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::error::AdminError;

/// Login entry point for unauthenticated visitors.
pub const LOGIN_PATH: &str = "/admin/login";

/// Where the admin session stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Loading,
    Authenticated(AuthUser),
    Unauthenticated,
}

/// What to do with a request for an admin view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Session not resolved yet; render a waiting state.
    Wait,
    /// Send the visitor to [`LOGIN_PATH`], remembering where they wanted to go.
    RedirectToLogin { from: String },
    /// Render the view.
    Allow(AuthUser),
}

impl SessionState {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub const fn user(&self) -> Option<&AuthUser> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Loading | Self::Unauthenticated => None,
        }
    }

    /// Gate a request for `requested`.
    #[must_use]
    pub fn decide(&self, requested: &str) -> GateDecision {
        match self {
            Self::Loading => GateDecision::Wait,
            Self::Unauthenticated => GateDecision::RedirectToLogin {
                from: requested.to_string(),
            },
            Self::Authenticated(user) => GateDecision::Allow(user.clone()),
        }
    }

    fn from_user(user: Option<AuthUser>) -> Self {
        user.map_or(Self::Unauthenticated, Self::Authenticated)
    }
}

/// Shared admin session bound to an auth provider.
#[derive(Debug)]
pub struct AdminSession<A> {
    auth: A,
    state: Arc<watch::Sender<SessionState>>,
}

impl<A: AuthProvider> AdminSession<A> {
    /// A session in the `Loading` state.
    pub fn new(auth: A) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self {
            auth,
            state: Arc::new(state),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// State change notifications.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Ask the provider for the persisted session and leave `Loading`.
    ///
    /// A provider error resolves to `Unauthenticated`.
    #[instrument(skip(self))]
    pub async fn resolve(&self) -> SessionState {
        let user = match self.auth.current_user().await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "Could not resolve admin session");
                None
            }
        };
        let state = SessionState::from_user(user);
        self.state.send_replace(state.clone());
        state
    }

    /// Apply a session-change notification from the provider.
    ///
    /// Ignored while `Loading`; [`AdminSession::resolve`] reads the current
    /// session anyway.
    pub fn apply(&self, user: Option<AuthUser>) {
        apply_change(&self.state, user);
    }

    /// Apply provider notifications in the background until the returned
    /// handle is stopped or dropped.
    #[must_use]
    pub fn follow(&self) -> SessionFollower {
        let mut changes = self.auth.session_changes();
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let user = changes.borrow_and_update().clone();
                apply_change(&state, user);
            }
        });
        SessionFollower { task }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns the provider error; the state is left unchanged.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AdminError> {
        let user = self.auth.sign_in_with_password(email, password).await?;
        tracing::info!(user_id = %user.id, "Admin signed in");
        self.state
            .send_replace(SessionState::Authenticated(user.clone()));
        Ok(user)
    }

    /// Sign out. The local state is cleared even if the provider call fails.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), AdminError> {
        let result = self.auth.sign_out().await;
        self.state.send_replace(SessionState::Unauthenticated);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Sign-out failed remotely");
        }
        result.map_err(AdminError::from)
    }

    /// Gate a request for `requested` against the current state.
    #[must_use]
    pub fn gate(&self, requested: &str) -> GateDecision {
        self.state.borrow().decide(requested)
    }

    /// The signed-in admin.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::Unauthenticated`] unless a user is signed in.
    pub fn require_user(&self) -> Result<AuthUser, AdminError> {
        self.state
            .borrow()
            .user()
            .cloned()
            .ok_or(AdminError::Unauthenticated)
    }
}

fn apply_change(state: &watch::Sender<SessionState>, user: Option<AuthUser>) {
    state.send_if_modified(|current| {
        if current.is_loading() {
            return false;
        }
        let next = SessionState::from_user(user);
        if *current == next {
            return false;
        }
        tracing::debug!(authenticated = next.is_authenticated(), "Admin session changed");
        *current = next;
        true
    });
}

/// Background task applying provider notifications to a session.
#[derive(Debug)]
pub struct SessionFollower {
    task: JoinHandle<()>,
}

impl SessionFollower {
    /// Stop following.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for SessionFollower {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use elvora_core::backend::BackendError;
    use elvora_core::backend::memory::MemoryBackend;

    use super::*;

    fn user() -> AuthUser {
        AuthUser {
            id: "user-1".to_string(),
            email: Some("admin@elvora.ma".to_string()),
        }
    }

    #[test]
    fn test_loading_never_redirects() {
        let state = SessionState::Loading;
        assert_eq!(state.decide("/admin/orders/4"), GateDecision::Wait);
    }

    #[test]
    fn test_unauthenticated_redirect_keeps_origin() {
        assert_eq!(
            SessionState::Unauthenticated.decide("/admin/orders/4"),
            GateDecision::RedirectToLogin {
                from: "/admin/orders/4".to_string()
            }
        );
        assert_eq!(
            SessionState::Authenticated(user()).decide("/admin"),
            GateDecision::Allow(user())
        );
    }

    #[tokio::test]
    async fn test_notifications_ignored_until_resolved() {
        let session = AdminSession::new(MemoryBackend::new());
        session.apply(Some(user()));
        assert_eq!(session.gate("/admin"), GateDecision::Wait);

        assert_eq!(session.resolve().await, SessionState::Unauthenticated);
        session.apply(Some(user()));
        assert_eq!(session.gate("/admin"), GateDecision::Allow(user()));
        session.apply(None);
        assert!(matches!(
            session.gate("/admin"),
            GateDecision::RedirectToLogin { .. }
        ));
    }

    #[tokio::test]
    async fn test_follow_tracks_remote_sign_in_and_expiry() {
        let backend = MemoryBackend::new();
        backend.add_account("admin@elvora.ma", "s3cret-pass");
        let session = AdminSession::new(backend.clone());
        session.resolve().await;
        let follower = session.follow();
        let mut states = session.subscribe();

        backend
            .sign_in_with_password("admin@elvora.ma", "s3cret-pass")
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), states.wait_for(SessionState::is_authenticated))
            .await
            .unwrap()
            .unwrap();

        backend.expire_session();
        tokio::time::timeout(
            Duration::from_secs(2),
            states.wait_for(|s| *s == SessionState::Unauthenticated),
        )
        .await
        .unwrap()
        .unwrap();
        follower.stop();
    }

    #[tokio::test]
    async fn test_sign_in_failure_keeps_state() {
        let backend = MemoryBackend::new();
        backend.add_account("admin@elvora.ma", "s3cret-pass");
        let session = AdminSession::new(backend);
        session.resolve().await;

        let err = session.sign_in("admin@elvora.ma", "nope").await.unwrap_err();
        assert!(matches!(
            err,
            AdminError::Backend(BackendError::InvalidCredentials)
        ));
        assert!(session.require_user().is_err());

        session.sign_in("admin@elvora.ma", "s3cret-pass").await.unwrap();
        assert!(session.state().is_authenticated());
        session.sign_out().await.unwrap();
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }
}

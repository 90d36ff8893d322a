//! Reactive session store and its single teardown path.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::state::{AuthState, Session, TeardownReason};
use super::tokens::{Hydration, TokenManager};
use super::types::{AuthGrant, LoginRequest, RegisterRequest, User, UserPatch};
use crate::error::{Error, Result};

pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Credential exchange with the backing service.
pub trait AuthBackend: Send + Sync {
    fn login<'a>(&'a self, request: &'a LoginRequest) -> BackendFuture<'a, AuthGrant>;
    fn register<'a>(&'a self, request: &'a RegisterRequest) -> BackendFuture<'a, AuthGrant>;
    /// Best-effort remote notification; local logout never depends on it.
    fn logout<'a>(&'a self, token: &'a str) -> BackendFuture<'a, ()>;
}

pub struct SessionStore {
    tokens: Arc<TokenManager>,
    backend: Arc<dyn AuthBackend>,
    state: watch::Sender<AuthState>,
}

impl SessionStore {
    #[must_use]
    pub fn new(tokens: Arc<TokenManager>, backend: Arc<dyn AuthBackend>) -> Self {
        let (state, _) = watch::channel(AuthState::Anonymous);
        Self {
            tokens,
            backend,
            state,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state.borrow().session().map(|session| session.token.clone())
    }

    #[must_use]
    pub fn permissions(&self) -> &'static [&'static str] {
        self.state.borrow().permissions()
    }

    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Exchange credentials for a session.
    ///
    /// # Errors
    /// `CredentialsRejected` when the backend refuses, `Validation` for blank
    /// input, transient errors when the backend is unreachable. The state is
    /// left untouched on any error.
    #[instrument(skip(self, request), fields(identifier = %request.identifier))]
    pub async fn login(&self, request: &LoginRequest) -> Result<User> {
        request.validate()?;
        let grant = self.backend.login(request).await.map_err(|err| {
            warn!("Login failed: {err}");
            err
        })?;
        self.establish(grant)
    }

    /// Create an account and start a session for it.
    ///
    /// # Errors
    /// Same classification as `login`; profile checks fail with `Validation`.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<User> {
        request.validate()?;
        let grant = self.backend.register(request).await.map_err(|err| {
            warn!("Registration failed: {err}");
            err
        })?;
        self.establish(grant)
    }

    fn establish(&self, grant: AuthGrant) -> Result<User> {
        let AuthGrant { user, token } = grant;
        let mut outcome = Ok(());
        self.state
            .send_if_modified(|state| match self.tokens.set(&token, &user) {
                Ok(()) => {
                    *state = AuthState::Authenticated(Session {
                        user: user.clone(),
                        token: token.clone(),
                    });
                    true
                }
                Err(err) => {
                    outcome = Err(err);
                    false
                }
            });
        outcome?;
        info!(user_id = %user.id, "session established");
        Ok(user)
    }

    /// Restore the session from persisted storage.
    ///
    /// Runs at process start and whenever a guard needs to re-synchronize the
    /// in-memory state with storage. Anything short of a valid token plus a
    /// readable user snapshot ends in a clean `Anonymous` state. An active
    /// session stays visible while storage is read, and if another transition
    /// lands in the meantime (a login, a teardown) that transition is kept.
    #[instrument(skip(self))]
    pub fn initialize(&self) -> AuthState {
        let mut held = None;
        self.state.send_if_modified(|state| {
            if let AuthState::Authenticated(session) = state {
                held = Some(session.token.clone());
                false
            } else {
                *state = AuthState::Validating;
                true
            }
        });

        match self.tokens.hydrate() {
            Hydration::Loaded => {}
            Hydration::Empty => info!("no persisted session"),
            Hydration::Discarded(err) => warn!("persisted session discarded: {err}"),
        }

        let mut restored = match (self.tokens.get(), self.tokens.user()) {
            (Some(token), Some(user)) if self.tokens.is_valid() => Some(Session { user, token }),
            (Some(_), _) => {
                warn!("persisted token is no longer valid");
                None
            }
            _ => None,
        };

        self.state.send_if_modified(|state| {
            let unchanged = match (&*state, &held) {
                (AuthState::Validating, None) => true,
                (AuthState::Authenticated(session), Some(token)) => session.token == *token,
                _ => false,
            };
            if !unchanged {
                debug!(state = state.label(), "state moved during hydration, keeping it");
                return false;
            }
            match restored.take() {
                Some(session) if state.session() == Some(&session) => false,
                Some(session) => {
                    info!(user_id = %session.user.id, "session restored");
                    *state = AuthState::Authenticated(session);
                    true
                }
                None => {
                    if let Err(err) = self.tokens.clear() {
                        error!("Failed to clear session storage: {err}");
                    }
                    info!(reason = TeardownReason::Invalid.as_str(), "session ended");
                    *state = AuthState::Anonymous;
                    true
                }
            }
        });

        self.state()
    }

    /// Local logout plus a best-effort remote notification.
    ///
    /// Idempotent: returns `true` only for the call that actually ended a
    /// session. Every call leaves the store `Anonymous` and storage cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> bool {
        let token = self.token();
        let ended = self.end_session(TeardownReason::Logout);
        if ended && let Some(token) = token {
            if let Err(err) = self.backend.logout(&token).await {
                warn!("Remote logout failed, local session already cleared: {err}");
            }
        }
        ended
    }

    /// The single teardown path used by logout, expiry and 401 handling.
    ///
    /// Clearing and the state transition happen under the state lock, so two
    /// racing callers observe exactly one transition.
    pub fn end_session(&self, reason: TeardownReason) -> bool {
        if reason == TeardownReason::Expired {
            self.state.send_if_modified(|state| {
                if state.is_authenticated() {
                    *state = AuthState::Expired;
                    true
                } else {
                    false
                }
            });
        }

        let mut ended = false;
        self.state.send_if_modified(|state| {
            if let Err(err) = self.tokens.clear() {
                error!("Failed to clear session storage: {err}");
            }
            ended = !state.is_anonymous();
            *state = AuthState::Anonymous;
            ended
        });

        if ended {
            match reason {
                TeardownReason::Expired => warn!("session expired, logged out"),
                TeardownReason::Unauthorized => warn!("session rejected by backend, logged out"),
                TeardownReason::Logout | TeardownReason::Invalid => {
                    info!(reason = reason.as_str(), "session ended");
                }
            }
        }
        ended
    }

    /// Merge `patch` into the cached user. No-op unless authenticated; an
    /// empty patch returns the current user without touching storage.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the snapshot could not be persisted.
    pub fn update_user(&self, patch: &UserPatch) -> Result<Option<User>> {
        if patch.is_empty() {
            return Ok(self.current_user());
        }
        let mut outcome: Result<Option<User>> = Ok(None);
        self.state.send_if_modified(|state| {
            let AuthState::Authenticated(session) = state else {
                return false;
            };
            let merged = patch.apply(&session.user);
            match self.tokens.update_user(&merged) {
                Ok(()) => {
                    session.user = merged.clone();
                    outcome = Ok(Some(merged));
                    true
                }
                Err(err) => {
                    outcome = Err(err);
                    false
                }
            }
        });
        outcome
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.state.borrow().label())
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

/// Registration errors mentioning a taken field get a specific message.
#[must_use]
pub fn refine_register_error(err: Error) -> Error {
    match err {
        Error::CredentialsRejected(message) | Error::Validation { message, .. }
            if message.to_lowercase().contains("username") =>
        {
            Error::CredentialsRejected("Username already exists.".to_string())
        }
        Error::CredentialsRejected(message) | Error::Validation { message, .. }
            if message.to_lowercase().contains("email") =>
        {
            Error::CredentialsRejected("Email already in use.".to_string())
        }
        other => other,
    }
}

//! Client-side navigation guard.

use std::sync::Arc;

use tracing::debug;

use super::decision::{Decision, evaluate};
use crate::config::SessionConfig;
use crate::routes::login_redirect;
use crate::session::{AuthState, Hydration, SessionStore, TeardownReason};
use crate::token::Validity;

/// Where the client currently is and how to move it.
pub trait Navigator: Send + Sync {
    /// Current location, path plus query.
    fn current_path(&self) -> String;
    fn navigate(&self, location: &str);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationKind {
    /// Server-rendered load the edge guard already decided.
    Initial,
    /// Transition performed entirely on the client.
    ClientDriven,
}

pub struct ClientGuard {
    config: Arc<SessionConfig>,
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
}

impl ClientGuard {
    #[must_use]
    pub fn new(
        config: Arc<SessionConfig>,
        session: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            session,
            navigator,
        }
    }

    /// Run the guard for a navigation to `target`.
    ///
    /// The session is re-synchronized first and the decision is computed from
    /// the state read afterwards. Initial loads never redirect here.
    pub fn on_navigation(&self, target: &str, kind: NavigationKind) -> Decision {
        debug!(target, ?kind, "client navigation");
        self.rehydrate();

        if kind == NavigationKind::Initial {
            return Decision::Allow;
        }

        let decision = evaluate(&self.config, target, self.session.is_authenticated());
        if let Decision::RedirectTo(location) = &decision {
            self.navigator.navigate(location);
        }
        decision
    }

    /// Bring the in-memory state in line with storage and the clock.
    pub fn rehydrate(&self) {
        match self.session.state() {
            AuthState::Authenticated(_) => {
                if let Validity::Invalid(reason) = self.session.tokens().validity() {
                    if let Some(err) = reason.as_error() {
                        debug!("held session no longer valid: {err}");
                    }
                    self.session.end_session(TeardownReason::Expired);
                }
            }
            AuthState::Anonymous => {
                if matches!(self.session.tokens().hydrate(), Hydration::Loaded) {
                    self.session.initialize();
                }
            }
            AuthState::Validating | AuthState::Expired => {}
        }
    }

    /// Component-level check: redirect to login unless a valid session exists.
    pub fn require_auth(&self) -> bool {
        if self.session.is_authenticated() && self.session.tokens().is_valid() {
            return true;
        }
        let current = self.navigator.current_path();
        self.navigator
            .navigate(&login_redirect(self.config.login_path(), &current));
        false
    }

    /// Component-level check for guest-only screens.
    pub fn require_guest(&self) -> bool {
        if self.session.is_authenticated() && self.session.tokens().is_valid() {
            self.navigator.navigate(self.config.landing_path());
            return false;
        }
        true
    }
}

impl std::fmt::Debug for ClientGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientGuard")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

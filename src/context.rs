//! Explicit session context constructed once at process start.
//!
//! Every component receives its collaborators from here; there is no global
//! session state. The context also owns the expiry watcher so the timer's
//! lifetime is tied to the session's.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use crate::api::{ApiGateway, HttpAuthBackend, HttpTransport};
use crate::config::SessionConfig;
use crate::guard::{ClientGuard, EdgeGuard, ExpiryWatcher, Navigator};
use crate::session::{AuthBackend, AuthState, SessionStore, TokenManager};
use crate::storage::KeyValueStore;
use crate::token::{Clock, SystemClock, TokenValidator};

pub struct SessionContext {
    config: Arc<SessionConfig>,
    validator: TokenValidator,
    session: Arc<SessionStore>,
    gateway: ApiGateway,
    watcher: Mutex<Option<ExpiryWatcher>>,
}

impl SessionContext {
    /// Wire the default HTTP backend against `transport` with the system clock.
    #[must_use]
    pub fn new(
        config: SessionConfig,
        storage: Arc<dyn KeyValueStore>,
        transport: HttpTransport,
    ) -> Self {
        let backend = Arc::new(HttpAuthBackend::new(transport.clone()));
        Self::with_parts(config, storage, transport, backend, Arc::new(SystemClock))
    }

    /// Same as [`SessionContext::new`] with an explicit backend and clock.
    #[must_use]
    pub fn with_parts(
        config: SessionConfig,
        storage: Arc<dyn KeyValueStore>,
        transport: HttpTransport,
        backend: Arc<dyn AuthBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let validator = TokenValidator::new(clock, config.skew_buffer());
        let tokens = Arc::new(TokenManager::new(storage, validator.clone()));
        let session = Arc::new(SessionStore::new(tokens, backend));
        let gateway = ApiGateway::new(transport, session.clone());
        Self {
            config: Arc::new(config),
            validator,
            session,
            gateway,
            watcher: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Arc<SessionConfig> {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    #[must_use]
    pub fn gateway(&self) -> &ApiGateway {
        &self.gateway
    }

    #[must_use]
    pub fn edge_guard(&self) -> EdgeGuard {
        EdgeGuard::new(self.config.clone(), self.validator.clone())
    }

    #[must_use]
    pub fn client_guard(&self, navigator: Arc<dyn Navigator>) -> ClientGuard {
        ClientGuard::new(self.config.clone(), self.session.clone(), navigator)
    }

    /// Hydrate the session and start the expiry watcher.
    ///
    /// Must run inside a tokio runtime. Calling it again restarts the watcher.
    pub fn start(&self, navigator: Arc<dyn Navigator>) -> AuthState {
        let state = self.session.initialize();
        let watcher = ExpiryWatcher::spawn(
            self.session.clone(),
            self.config.clone(),
            navigator,
            self.config.watch_interval(),
        );
        // The previous watcher, if any, is aborted on drop.
        let _previous = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(watcher);
        info!(state = state.label(), "session context started");
        state
    }

    #[must_use]
    pub fn watcher_running(&self) -> bool {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(ExpiryWatcher::is_running)
    }

    /// Stop the watcher. The session itself is left as is.
    pub async fn shutdown(&self) {
        let watcher = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(watcher) = watcher {
            watcher.stop().await;
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("watcher_running", &self.watcher_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DEFAULT_TIMEOUT;
    use crate::guard::NavigationKind;
    use crate::session::LoginRequest;
    use crate::session::fixtures::{FakeBackend, NOW_SECS};
    use crate::storage::MemoryStore;
    use crate::token::FixedClock;
    use anyhow::Result;
    use std::sync::Mutex as StdMutex;

    struct StaticNavigator(StdMutex<String>);

    impl Navigator for StaticNavigator {
        fn current_path(&self) -> String {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        fn navigate(&self, location: &str) {
            *self.0.lock().unwrap_or_else(PoisonError::into_inner) = location.to_string();
        }
    }

    fn context(storage: Arc<MemoryStore>) -> Result<SessionContext> {
        let transport = HttpTransport::new("http://127.0.0.1:9", DEFAULT_TIMEOUT)?;
        Ok(SessionContext::with_parts(
            SessionConfig::new(),
            storage,
            transport,
            Arc::new(FakeBackend::default()),
            Arc::new(FixedClock::at_secs(NOW_SECS)),
        ))
    }

    #[tokio::test]
    async fn start_restores_and_shutdown_stops_the_watcher() -> Result<()> {
        let storage = Arc::new(MemoryStore::new());
        let first = context(storage.clone())?;
        first
            .session()
            .login(&LoginRequest::new("aria", "secret"))
            .await?;

        let second = context(storage)?;
        let navigator = Arc::new(StaticNavigator(StdMutex::new("/dashboard".to_string())));
        let state = second.start(navigator.clone());
        assert!(state.is_authenticated());
        assert!(second.watcher_running());

        let guard = second.client_guard(navigator);
        assert!(guard
            .on_navigation("/login", NavigationKind::ClientDriven)
            .location()
            .is_some());

        second.shutdown().await;
        assert!(!second.watcher_running());
        Ok(())
    }

    #[test]
    fn edge_guard_shares_config() -> Result<()> {
        let context = context(Arc::new(MemoryStore::new()))?;
        assert_eq!(context.edge_guard().config().cookie_name(), "rpg_auth_token");
        Ok(())
    }
}

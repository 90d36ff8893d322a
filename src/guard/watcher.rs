//! Background expiry polling.
//!
//! The watcher is a tokio task owned by whoever spawned it. `stop` ends it
//! cleanly; dropping the handle aborts it so no timer outlives its session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use super::navigation::Navigator;
use crate::config::SessionConfig;
use crate::routes::{RouteClass, login_redirect};
use crate::session::{SessionStore, TeardownReason};

/// What a single check did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Nothing held, or the held token is still valid.
    Healthy,
    /// Session ended; the user was not on a protected page.
    LoggedOut,
    /// Session ended and the user was sent to login.
    Redirected,
}

#[derive(Debug)]
pub struct ExpiryWatcher {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ExpiryWatcher {
    /// Start polling every `period`. The first check runs one period from now.
    #[must_use]
    pub fn spawn(
        session: Arc<SessionStore>,
        config: Arc<SessionConfig>,
        navigator: Arc<dyn Navigator>,
        period: Duration,
    ) -> Self {
        let period = if period.is_zero() {
            Duration::from_secs(1)
        } else {
            period
        };
        let (shutdown, mut stopped) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        check(&session, &config, navigator.as_ref());
                    }
                }
            }
            debug!("expiry watcher stopped");
        });

        Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the task and wait for it to exit.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.await
        {
            warn!("Expiry watcher task failed: {err}");
        }
    }
}

impl Drop for ExpiryWatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// One watcher tick.
///
/// Acts only when a token is held or a session is active; an anonymous user
/// with nothing stored is left alone.
pub fn check(session: &SessionStore, config: &SessionConfig, navigator: &dyn Navigator) -> WatchOutcome {
    let tokens = session.tokens();
    let holds_session = tokens.get().is_some() || session.is_authenticated();
    if !holds_session || tokens.is_valid() {
        return WatchOutcome::Healthy;
    }

    warn!("Token expired, logging out");
    session.end_session(TeardownReason::Expired);

    let current = navigator.current_path();
    if config.routes().classify(&current) == RouteClass::Protected {
        navigator.navigate(&login_redirect(config.login_path(), &current));
        WatchOutcome::Redirected
    } else {
        WatchOutcome::LoggedOut
    }
}

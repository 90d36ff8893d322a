//! Session configuration shared by the edge guard, client guard and watcher.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::routes::{DEFAULT_LANDING_PATH, DEFAULT_LOGIN_PATH, RouteClass, RouteTable};
use crate::storage::AUTH_TOKEN_KEY;
use crate::token::DEFAULT_SKEW_BUFFER;

/// Default polling period of the expiry watcher.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    cookie_name: String,
    skew_buffer: Duration,
    watch_interval: Duration,
    login_path: String,
    landing_path: String,
    routes: RouteTable,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cookie_name: AUTH_TOKEN_KEY.to_string(),
            skew_buffer: DEFAULT_SKEW_BUFFER,
            watch_interval: DEFAULT_WATCH_INTERVAL,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            landing_path: DEFAULT_LANDING_PATH.to_string(),
            routes: RouteTable::default(),
        }
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: String) -> Self {
        self.cookie_name = name;
        self
    }

    #[must_use]
    pub fn with_skew_buffer(mut self, buffer: Duration) -> Self {
        self.skew_buffer = buffer;
        self
    }

    /// A zero interval is clamped to one second.
    #[must_use]
    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval.max(Duration::from_secs(1));
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: String) -> Self {
        self.login_path = path;
        self
    }

    #[must_use]
    pub fn with_landing_path(mut self, path: String) -> Self {
        self.landing_path = path;
        self
    }

    #[must_use]
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    /// Check the login and landing paths against the route table.
    ///
    /// The login page must be reachable without a session and the landing page
    /// must be reachable with one, otherwise the edge guard redirects in a loop.
    ///
    /// # Errors
    /// Returns `Error::Config` naming the offending path.
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [("login", &self.login_path), ("landing", &self.landing_path)] {
            if !path.starts_with('/') {
                return Err(Error::Config(format!("{name} path must start with '/': {path}")));
            }
        }
        if self.routes.classify(&self.login_path) == RouteClass::Protected {
            return Err(Error::Config(format!(
                "login path {} is a protected route",
                self.login_path
            )));
        }
        if self.routes.classify(&self.landing_path) == RouteClass::AuthOnly {
            return Err(Error::Config(format!(
                "landing path {} is an auth-only route",
                self.landing_path
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn skew_buffer(&self) -> Duration {
        self.skew_buffer
    }

    #[must_use]
    pub fn watch_interval(&self) -> Duration {
        self.watch_interval
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

use crate::config::SessionConfig;
use crate::routes::{RouteClass, login_redirect};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RedirectTo(String),
}

impl Decision {
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::RedirectTo(location) => Some(location),
        }
    }
}

/// Access decision for a single navigation.
///
/// `original` is the requested path including its query; it is what the login
/// page sends the user back to.
#[must_use]
pub fn decide(
    route: RouteClass,
    authenticated: bool,
    original: &str,
    login_path: &str,
    landing_path: &str,
) -> Decision {
    match (route, authenticated) {
        (RouteClass::Protected, false) => Decision::RedirectTo(login_redirect(login_path, original)),
        (RouteClass::AuthOnly, true) => Decision::RedirectTo(landing_path.to_string()),
        _ => Decision::Allow,
    }
}

/// [`decide`] with the route class and paths taken from `config`.
#[must_use]
pub fn evaluate(config: &SessionConfig, original: &str, authenticated: bool) -> Decision {
    decide(
        config.routes().classify(original),
        authenticated,
        original,
        config.login_path(),
        config.landing_path(),
    )
}

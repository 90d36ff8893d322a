//! Route classification shared by the edge guard and the client guard.
//!
//! A path belongs to a prefix when it equals the prefix or continues it with a
//! `/` segment boundary, so `/dashboard/42` is protected while `/dashboards` is
//! public. The protected and auth-only sets can never overlap; `RouteTable::new`
//! rejects tables where they would.

use crate::error::{Error, Result};

pub const DEFAULT_PROTECTED_ROUTES: [&str; 4] = ["/dashboard", "/characters", "/profile", "/settings"];
pub const DEFAULT_AUTH_ROUTES: [&str; 2] = ["/login", "/register"];
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_LANDING_PATH: &str = "/dashboard";

/// Query parameter carrying the original destination through the login page.
pub const REDIRECT_PARAM: &str = "redirect";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected,
    /// Login/register style pages that authenticated users must not see.
    AuthOnly,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTable {
    protected: Vec<String>,
    auth_only: Vec<String>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            protected: DEFAULT_PROTECTED_ROUTES.iter().map(ToString::to_string).collect(),
            auth_only: DEFAULT_AUTH_ROUTES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl RouteTable {
    /// Build a table from prefix lists.
    ///
    /// # Errors
    /// Returns `Error::Config` when a prefix is not absolute or when a protected
    /// prefix and an auth-only prefix would both match some path.
    pub fn new<P, A>(protected: P, auth_only: A) -> Result<Self>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        let protected = normalize_prefixes(protected)?;
        let auth_only = normalize_prefixes(auth_only)?;

        for guarded in &protected {
            for auth in &auth_only {
                if matches_prefix(guarded, auth) || matches_prefix(auth, guarded) {
                    return Err(Error::Config(format!(
                        "route prefix {guarded} overlaps auth-only prefix {auth}"
                    )));
                }
            }
        }

        Ok(Self {
            protected,
            auth_only,
        })
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        let path = strip_query(path);
        if self.protected.iter().any(|prefix| matches_prefix(path, prefix)) {
            RouteClass::Protected
        } else if self.auth_only.iter().any(|prefix| matches_prefix(path, prefix)) {
            RouteClass::AuthOnly
        } else {
            RouteClass::Public
        }
    }

    #[must_use]
    pub fn protected(&self) -> &[String] {
        &self.protected
    }

    #[must_use]
    pub fn auth_only(&self) -> &[String] {
        &self.auth_only
    }
}

fn normalize_prefixes<I>(prefixes: I) -> Result<Vec<String>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut normalized = Vec::new();
    for prefix in prefixes {
        let prefix = prefix.as_ref().trim();
        if prefix.is_empty() {
            continue;
        }
        if !prefix.starts_with('/') {
            return Err(Error::Config(format!("route prefix must start with '/': {prefix}")));
        }
        let prefix = match prefix.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        normalized.push(prefix.to_string());
    }
    Ok(normalized)
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

/// Login URL carrying the original path: `/login?redirect=%2Fdashboard%2F42`.
#[must_use]
pub fn login_redirect(login_path: &str, original_path: &str) -> String {
    format!(
        "{login_path}?{REDIRECT_PARAM}={}",
        urlencoding::encode(original_path)
    )
}

/// Where to go after a successful login.
///
/// The decoded `redirect` value is honoured only when it is a local absolute
/// path; anything else (absent, undecodable, `//host`, `https://..`) falls back
/// to the landing path.
#[must_use]
pub fn post_login_destination(redirect: Option<&str>, landing_path: &str) -> String {
    redirect
        .and_then(|raw| urlencoding::decode(raw).ok())
        .map(|decoded| decoded.trim().to_string())
        .filter(|target| is_local_path(target))
        .unwrap_or_else(|| landing_path.to_string())
}

/// Extract the raw `redirect` parameter from a query string.
#[must_use]
pub fn redirect_param(query: &str) -> Option<&str> {
    query
        .trim_start_matches('?')
        .split('&')
        .find_map(|pair| pair.strip_prefix(REDIRECT_PARAM)?.strip_prefix('='))
}

fn is_local_path(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}

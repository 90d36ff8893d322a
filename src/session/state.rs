use super::types::User;

/// Flat permission set granted to every authenticated user.
pub const AUTHENTICATED_PERMISSIONS: [&str; 3] =
    ["read:characters", "write:characters", "delete:characters"];

/// An authenticated session. Never mutated except for user snapshot updates.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("token", &"***")
            .finish()
    }
}

/// Client-side auth state machine.
///
/// `Anonymous -> Validating -> {Authenticated, Anonymous}` during
/// initialization, `Authenticated -> Anonymous` on logout or a 401, and
/// `Authenticated -> Expired -> Anonymous` when local expiry is detected.
/// `Expired` is transient: every teardown ends in `Anonymous`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Anonymous,
    Validating,
    Authenticated(Session),
    Expired,
}

impl AuthState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.session().map(|session| &session.user)
    }

    #[must_use]
    pub fn permissions(&self) -> &'static [&'static str] {
        if self.is_authenticated() {
            &AUTHENTICATED_PERMISSIONS
        } else {
            &[]
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Validating => "validating",
            Self::Authenticated(_) => "authenticated",
            Self::Expired => "expired",
        }
    }
}

/// Why a session is being torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeardownReason {
    /// User-initiated logout.
    Logout,
    /// Local expiry detected by the watcher or a guard.
    Expired,
    /// The backend answered 401.
    Unauthorized,
    /// Hydration found no usable session.
    Invalid,
}

impl TeardownReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::Expired => "expired",
            Self::Unauthorized => "unauthorized",
            Self::Invalid => "invalid",
        }
    }
}

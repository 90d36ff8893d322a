//! Client-side session core: the token owner and the reactive auth state.

mod state;
mod store;
mod tokens;
mod types;

pub use state::{AUTHENTICATED_PERMISSIONS, AuthState, Session, TeardownReason};
pub use store::{AuthBackend, BackendFuture, SessionStore, refine_register_error};
pub use tokens::{Hydration, TokenManager};
pub use types::{AuthGrant, LoginRequest, RegisterRequest, User, UserPatch};

#[cfg(test)]
pub(crate) use store::tests as fixtures;

//! # Tessera (session and access-control core)
//!
//! Two enforcement points decide from the same bearer token:
//!
//! - **Edge guard:** axum middleware in front of every page load. It classifies
//!   the path, reads the token from the session cookie or an
//!   `Authorization: Bearer` header, and either redirects or forwards the
//!   request with an [`guard::AuthContext`] attached.
//! - **Client guard:** re-checks on client-driven navigation, while the
//!   [`guard::ExpiryWatcher`] polls the token in the background.
//!
//! ## Session model
//!
//! [`session::SessionStore`] is the client-side state machine
//! (`Anonymous`, `Validating`, `Authenticated`, `Expired`). It is built once per
//! process inside a [`context::SessionContext`] and is never global. Every
//! teardown (logout, local expiry, a 401 from [`api::ApiGateway`]) goes through
//! one idempotent path that clears persisted storage and resets the state.
//!
//! ## Tokens
//!
//! Tokens are three dot-separated segments with a base64url JSON payload
//! carrying `exp` in seconds. The signature is never checked here; the backend
//! owns that. A token counts as valid only while `now + skew buffer < exp`.

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod routes;
pub mod server;
pub mod session;
pub mod storage;
pub mod token;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

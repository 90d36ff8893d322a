//! Outbound HTTP: the raw transport, the session-aware gateway and the
//! credential endpoints.

mod auth;
mod gateway;
mod transport;

pub use auth::HttpAuthBackend;
pub use gateway::ApiGateway;
pub use transport::{DEFAULT_API_BASE_URL, DEFAULT_TIMEOUT, HttpTransport, RawResponse};

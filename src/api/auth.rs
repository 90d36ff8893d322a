//! `AuthBackend` over the backing service's `auth/*` endpoints.

use reqwest::Method;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::transport::{HttpTransport, RawResponse};
use crate::error::{Error, Result, classify_status, sanitize_body};
use crate::session::{
    AuthBackend, AuthGrant, BackendFuture, LoginRequest, RegisterRequest, User,
    refine_register_error,
};

const LOGIN_PATH: &str = "auth/login";
const REGISTER_PATH: &str = "auth/register";
const LOGOUT_PATH: &str = "auth/logout";
pub(super) const ME_PATH: &str = "auth/me";

const LOGIN_REJECTED: &str = "Invalid username or password.";
const REGISTER_REJECTED: &str = "Registration failed.";

/// `{ success, data, error, message }` response wrapper.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    error: Option<String>,
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self, fallback: &str) -> Result<T> {
        match self.data {
            Some(data) if self.success => Ok(data),
            _ => Err(Error::CredentialsRejected(
                self.error
                    .or(self.message)
                    .unwrap_or_else(|| fallback.to_string()),
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpAuthBackend {
    transport: HttpTransport,
}

impl HttpAuthBackend {
    #[must_use]
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    /// Fetch the profile the backend associates with `token`.
    ///
    /// Accepts both `{user}` and an enveloped `{data: {user}}` body.
    ///
    /// # Errors
    /// Classified status errors, or `Decode` when no user is present.
    #[instrument(skip(self, token))]
    pub async fn me(&self, token: &str) -> Result<User> {
        let response = self
            .transport
            .execute(Method::GET, ME_PATH, Some(token), None)
            .await?
            .error_for_status()?;
        user_from_body(response.json()?)
    }

    async fn exchange(&self, path: &str, body: Value, fallback: &str) -> Result<AuthGrant> {
        let response = self
            .transport
            .execute(Method::POST, path, None, Some(&body))
            .await?;
        let response = reject_client_errors(response, fallback)?;
        decode_envelope::<AuthGrant>(&response)?.into_data(fallback)
    }
}

/// Pull the user out of `{user}` or `{data: {user}}`.
pub(super) fn user_from_body(mut body: Value) -> Result<User> {
    if let Some(data) = body.get_mut("data") {
        body = data.take();
    }
    let user = body
        .get_mut("user")
        .map(Value::take)
        .ok_or_else(|| Error::Decode("response has no user".to_string()))?;
    serde_json::from_value(user).map_err(|err| Error::Decode(err.to_string()))
}

/// 4xx on a credential endpoint is a rejection, never a session teardown.
fn reject_client_errors(response: RawResponse, fallback: &str) -> Result<RawResponse> {
    let status = response.status;
    if status.is_client_error() {
        let message = if response.body.trim().is_empty() {
            fallback.to_string()
        } else {
            sanitize_body(&response.body)
        };
        return Err(Error::CredentialsRejected(message));
    }
    if !status.is_success() {
        return Err(classify_status(status.as_u16(), &response.body));
    }
    Ok(response)
}

fn decode_envelope<T: DeserializeOwned>(response: &RawResponse) -> Result<Envelope<T>> {
    serde_json::from_str(&response.body).map_err(|err| Error::Decode(err.to_string()))
}

impl AuthBackend for HttpAuthBackend {
    fn login<'a>(&'a self, request: &'a LoginRequest) -> BackendFuture<'a, AuthGrant> {
        Box::pin(async move {
            let body = json!({
                "login": request.identifier.trim(),
                "password": request.password.expose_secret(),
            });
            let grant = self.exchange(LOGIN_PATH, body, LOGIN_REJECTED).await?;
            debug!(user_id = %grant.user.id, "login accepted");
            Ok(grant)
        })
    }

    fn register<'a>(&'a self, request: &'a RegisterRequest) -> BackendFuture<'a, AuthGrant> {
        Box::pin(async move {
            let body = json!({
                "username": request.username.trim(),
                "email": request.email.trim(),
                "name": request.name.trim(),
                "password": request.password.expose_secret(),
            });
            self.exchange(REGISTER_PATH, body, REGISTER_REJECTED)
                .await
                .map_err(refine_register_error)
        })
    }

    fn logout<'a>(&'a self, token: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.transport
                .execute(Method::POST, LOGOUT_PATH, Some(token), None)
                .await?
                .error_for_status()?;
            Ok(())
        })
    }
}

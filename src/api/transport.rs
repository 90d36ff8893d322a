//! Raw HTTP plumbing shared by the gateway and the auth backend.
//!
//! The transport knows nothing about sessions: it builds URLs, attaches an
//! optional bearer token and maps I/O failures. Status handling belongs to the
//! callers, which is what lets a 401 mean "logout" in the gateway and
//! "bad credentials" on the login endpoint.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{Instrument, debug, info_span};
use url::Url;

use crate::APP_USER_AGENT;
use crate::error::{Error, Result, classify_status};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3001";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status and body of a completed exchange.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// # Errors
    /// Returns the classified status error for non-2xx responses.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(classify_status(self.status.as_u16(), &self.body))
        }
    }

    /// Decode the body as JSON; an empty body decodes as `null`.
    ///
    /// # Errors
    /// Returns `Error::Decode` when the body is not valid JSON.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|err| Error::Decode(err.to_string()))
    }
}

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// # Errors
    /// Returns `Error::Config` if the base URL is not an http(s) URL or the
    /// client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|err| Error::Config(format!("invalid API base URL {base_url}: {err}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported API URL scheme: {}",
                base_url.scheme()
            )));
        }
        // Relative joins must extend the base path rather than replace it.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|err| Error::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` against the base URL. Absolute URLs pass through.
    ///
    /// # Errors
    /// Returns `Error::Config` if the result is not a valid URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).map_err(|err| Error::Config(err.to_string()));
        }
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| Error::Config(format!("invalid endpoint {path}: {err}")))
    }

    /// Perform a single request. Never retries.
    ///
    /// # Errors
    /// `Timeout` or `Network` when no response was received.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        body: Option<&Value>,
    ) -> Result<RawResponse> {
        let url = self.endpoint(path)?;
        let span = info_span!("api.request", http.method = %method, url = %url);

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header(ACCEPT, "application/json");
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let started = std::time::Instant::now();
        let response = request.send().instrument(span).await.map_err(map_send_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_send_error)?;

        debug!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "api response"
        );
        Ok(RawResponse { status, body })
    }
}

fn map_send_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(err.without_url().to_string())
    }
}

//! Authenticated access to the backing API.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{instrument, warn};

use super::auth::{ME_PATH, user_from_body};
use super::transport::HttpTransport;
use crate::error::{Error, Result};
use crate::session::{SessionStore, TeardownReason, User};

/// Outbound calls that carry the session token.
///
/// The bearer header is attached only while the held token is valid. A 401
/// ends the session through [`SessionStore::end_session`]; nothing is
/// retried.
#[derive(Clone, Debug)]
pub struct ApiGateway {
    transport: HttpTransport,
    session: Arc<SessionStore>,
}

impl ApiGateway {
    #[must_use]
    pub fn new(transport: HttpTransport, session: Arc<SessionStore>) -> Self {
        Self { transport, session }
    }

    #[must_use]
    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    /// # Errors
    /// See [`ApiGateway::request`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None).await
    }

    /// # Errors
    /// See [`ApiGateway::request`].
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = to_body(body)?;
        self.request(Method::POST, path, Some(&body)).await
    }

    /// # Errors
    /// See [`ApiGateway::request`].
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = to_body(body)?;
        self.request(Method::PUT, path, Some(&body)).await
    }

    /// # Errors
    /// See [`ApiGateway::request`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::DELETE, path, None).await
    }

    /// Send a request and decode the JSON response.
    ///
    /// # Errors
    /// - `Unauthorized` after the session has been torn down for a 401.
    /// - `Forbidden`, `NotFound`, `Validation` for other 4xx; the session is
    ///   untouched.
    /// - `Server`, `Network`, `Timeout` for transient failures.
    /// - `Decode` when a success body does not match `T`.
    #[instrument(skip(self, method, body), fields(method = %method))]
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let tokens = self.session.tokens();
        let bearer = if tokens.is_valid() { tokens.get() } else { None };

        let response = self
            .transport
            .execute(method, path, bearer.as_deref(), body)
            .await?;

        if response.status == StatusCode::UNAUTHORIZED {
            if self.session.end_session(TeardownReason::Unauthorized) {
                warn!(path, "request rejected with 401, session ended");
            }
            return Err(Error::Unauthorized);
        }

        let value = response.error_for_status()?.json()?;
        serde_json::from_value(value).map_err(|err| Error::Decode(err.to_string()))
    }

    /// Profile of the session's user as the backend sees it.
    ///
    /// # Errors
    /// See [`ApiGateway::request`]; `Decode` when the body carries no user.
    pub async fn current_user(&self) -> Result<User> {
        let body: Value = self.get(ME_PATH).await?;
        user_from_body(body)
    }

    /// `true` when the health endpoint answers with a success status.
    pub async fn ping(&self) -> bool {
        match self.transport.execute(Method::GET, "health", None, None).await {
            Ok(response) => response.is_success(),
            Err(err) => {
                warn!("Health check failed: {err}");
                false
            }
        }
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|err| Error::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::DEFAULT_TIMEOUT;
    use crate::session::LoginRequest;
    use crate::session::fixtures::{Fixture, NOW_SECS, valid_token};
    use anyhow::Result;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    async fn signed_in(server: &MockServer) -> Result<(Fixture, ApiGateway)> {
        let fixture = Fixture::new();
        fixture
            .store
            .login(&LoginRequest::new("aria", "secret"))
            .await?;
        let transport = HttpTransport::new(&server.uri(), DEFAULT_TIMEOUT)?;
        let gateway = ApiGateway::new(transport, fixture.store.clone());
        Ok((fixture, gateway))
    }

    #[tokio::test]
    async fn attaches_bearer_when_token_is_valid() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/characters"))
            .and(header("authorization", format!("Bearer {}", valid_token()).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
            .expect(1)
            .mount(&server)
            .await;

        let (_fixture, gateway) = signed_in(&server).await?;
        let characters: Vec<Value> = gateway.get("characters").await?;
        assert_eq!(characters.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn expired_token_is_not_sent() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/public"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;

        let (fixture, gateway) = signed_in(&server).await?;
        fixture.clock.set_secs(NOW_SECS + 7200);
        let _: Value = gateway.get("/public").await?;

        let requests = server.received_requests().await.unwrap_or_default();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_401s_end_the_session_once() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "success": false,
                "error": "token revoked"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let (fixture, gateway) = signed_in(&server).await?;
        let mut receiver = fixture.store.subscribe();
        receiver.mark_unchanged();

        let (first, second) = tokio::join!(
            gateway.get::<Value>("characters"),
            gateway.get::<Value>("profile")
        );
        assert_eq!(first, Err(Error::Unauthorized));
        assert_eq!(second, Err(Error::Unauthorized));

        assert!(receiver.has_changed()?);
        assert!(receiver.borrow_and_update().is_anonymous());
        assert!(!fixture.store.end_session(TeardownReason::Unauthorized));
        assert!(fixture.store.tokens().get().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn forbidden_leaves_session_untouched() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/characters/3"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let (fixture, gateway) = signed_in(&server).await?;
        let result = gateway.delete::<Value>("characters/3").await;
        assert_eq!(result, Err(Error::Forbidden));
        assert!(fixture.store.is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn server_errors_are_transient() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/characters"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({ "message": "maintenance" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (fixture, gateway) = signed_in(&server).await?;
        let result = gateway
            .post::<Value, _>("characters", &json!({ "name": "Brom" }))
            .await;
        let Err(err) = result else {
            anyhow::bail!("expected a server error");
        };
        assert!(err.is_transient());
        assert_eq!(
            err,
            Error::Server {
                status: 503,
                message: "maintenance".to_string()
            }
        );
        assert!(fixture.store.is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn ping_reports_health() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .mount(&server)
            .await;

        let (_fixture, gateway) = signed_in(&server).await?;
        assert!(gateway.ping().await);

        let offline = ApiGateway::new(
            HttpTransport::new("http://127.0.0.1:9", DEFAULT_TIMEOUT)?,
            Fixture::new().store,
        );
        assert!(!offline.ping().await);
        Ok(())
    }
}

//! Server-side guard for page loads.
//!
//! Runs as axum middleware in front of every handler. It is the only place the
//! server makes a redirect decision; handlers read the resulting
//! [`AuthContext`] from request extensions instead of re-validating.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, COOKIE, LOCATION},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::decision::{Decision, evaluate};
use crate::config::SessionConfig;
use crate::token::TokenValidator;

/// Request-scoped auth facts attached by [`edge_guard`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub is_authenticated: bool,
    /// Present only when the token passed validation.
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("is_authenticated", &self.is_authenticated)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct EdgeGuard {
    config: Arc<SessionConfig>,
    validator: TokenValidator,
}

impl EdgeGuard {
    #[must_use]
    pub fn new(config: Arc<SessionConfig>, validator: TokenValidator) -> Self {
        Self { config, validator }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Token and decision for one request. Pure apart from the clock read.
    #[must_use]
    pub fn inspect(&self, headers: &HeaderMap, original: &str) -> (AuthContext, Decision) {
        let token = extract_token(headers, self.config.cookie_name());
        let is_authenticated = self.validator.is_valid(token.as_deref());
        let decision = evaluate(&self.config, original, is_authenticated);
        let context = AuthContext {
            is_authenticated,
            token: token.filter(|_| is_authenticated),
        };
        (context, decision)
    }
}

/// Middleware entry point, mounted with `middleware::from_fn_with_state`.
pub async fn edge_guard(State(guard): State<EdgeGuard>, mut request: Request, next: Next) -> Response {
    let original = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), ToString::to_string);

    let (context, decision) = guard.inspect(request.headers(), &original);
    match decision {
        Decision::RedirectTo(location) => {
            debug!(path = %request.uri().path(), location = %location, "edge guard redirect");
            (StatusCode::FOUND, [(LOCATION, location)]).into_response()
        }
        Decision::Allow => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
    }
}

/// Cookie first, then `Authorization: Bearer`.
fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    extract_cookie(headers, cookie_name).or_else(|| extract_bearer_token(headers))
}

fn extract_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            let value = value.trim();
            (key.trim() == cookie_name && !value.is_empty()).then(|| value.to_string())
        })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{DEFAULT_SKEW_BUFFER, FixedClock, encode_unsigned};
    use anyhow::Result;
    use axum::{
        Extension, Router,
        body::{Body, to_bytes},
        http::HeaderValue,
        middleware,
        routing::get,
    };
    use serde_json::json;
    use tower::ServiceExt;

    const NOW_SECS: u64 = 1_700_000_000;

    fn guard() -> EdgeGuard {
        let clock = Arc::new(FixedClock::at_secs(NOW_SECS));
        EdgeGuard::new(
            Arc::new(SessionConfig::new()),
            TokenValidator::new(clock, DEFAULT_SKEW_BUFFER),
        )
    }

    fn token(exp: u64) -> String {
        encode_unsigned(&json!({ "sub": "7", "exp": exp }))
    }

    async fn echo(Extension(context): Extension<AuthContext>) -> String {
        format!("authenticated={}", context.is_authenticated)
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(echo))
            .route("/login", get(echo))
            .route("/dashboard/{id}", get(echo))
            .layer(middleware::from_fn_with_state(guard(), edge_guard))
    }

    async fn body_text(response: Response) -> Result<String> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    #[tokio::test]
    async fn anonymous_protected_request_redirects_with_original_path() -> Result<()> {
        let response = app()
            .oneshot(Request::builder().uri("/dashboard/42").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(LOCATION),
            Some(&HeaderValue::from_static("/login?redirect=%2Fdashboard%2F42"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn expired_cookie_is_treated_as_anonymous() -> Result<()> {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/dashboard/42")
                    .header(COOKIE, format!("rpg_auth_token={}", token(NOW_SECS + 300)))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn valid_cookie_reaches_handler_with_context() -> Result<()> {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/dashboard/42")
                    .header(COOKIE, format!("theme=dark; rpg_auth_token={}", token(NOW_SECS + 3600)))
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await?, "authenticated=true");
        Ok(())
    }

    #[tokio::test]
    async fn bearer_header_is_the_fallback() -> Result<()> {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/login")
                    .header(AUTHORIZATION, format!("Bearer {}", token(NOW_SECS + 3600)))
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(LOCATION),
            Some(&HeaderValue::from_static("/dashboard"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn public_routes_pass_through_anonymously() -> Result<()> {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await?, "authenticated=false");
        Ok(())
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("rpg_auth_token=from-cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(
            extract_token(&headers, "rpg_auth_token").as_deref(),
            Some("from-cookie")
        );

        headers.remove(COOKIE);
        assert_eq!(
            extract_token(&headers, "rpg_auth_token").as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn context_debug_redacts_token() {
        let context = AuthContext {
            is_authenticated: true,
            token: Some("raw".to_string()),
        };
        assert!(!format!("{context:?}").contains("raw"));
    }
}

//! axum middleware for Egendata signed requests.
//!
//! [`SignedLayer`] takes the envelope from the request body for mutating
//! methods (`POST`, `PUT`, `PATCH`, `DELETE`) and from an
//! `Authorization: Bearer` header otherwise, verifies it with a
//! [`TokenService`], and attaches a [`SignedRequest`] to the request.
//!
//! | Outcome | Response |
//! |---------|----------|
//! | No token | `400 Bad Request` |
//! | Verification failed | `401 Unauthorized` |
//! | Verified | inner service, body restored |
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{routing::post, Router};
//! use egendata_messaging::{MessagingConfig, TokenService};
//! use egendata_messaging_axum::{SignedLayer, SignedRequest};
//!
//! async fn events(signed: SignedRequest) -> String {
//!     signed.message_type().to_string()
//! }
//!
//! # fn app() -> Result<Router, egendata_messaging::MessagingError> {
//! let tokens = Arc::new(TokenService::from_config(&MessagingConfig::from_env())?);
//! let app = Router::new()
//!     .route("/events", post(events))
//!     .layer(SignedLayer::new(tokens));
//! # Ok(app)
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, Request};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use egendata_messaging::{JoseHeader, MessageType, MessagingError, TokenService, VerifiedToken};
use serde_json::{json, Map, Value};
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Default cap on a body read as an envelope (256 KiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 256 * 1024;

/// A verified envelope, attached to the request it arrived with.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// The envelope as received.
    pub token: String,
    pub verified: VerifiedToken,
}

impl SignedRequest {
    pub fn message_type(&self) -> MessageType {
        self.verified.message_type
    }

    pub fn header(&self) -> &JoseHeader {
        &self.verified.header
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.verified.payload
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SignedRequest
where
    S: Send + Sync,
{
    type Rejection = SignedError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SignedRequest>()
            .cloned()
            .ok_or(SignedError::MissingToken)
    }
}

/// Rejections produced by the middleware.
#[derive(Debug, thiserror::Error)]
pub enum SignedError {
    #[error("no token")]
    MissingToken,

    #[error("unreadable body: {0}")]
    UnreadableBody(String),

    #[error(transparent)]
    Unauthorized(#[from] MessagingError),
}

impl SignedError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::UnreadableBody(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingToken => "MISSING_TOKEN",
            Self::UnreadableBody(_) => "UNREADABLE_BODY",
            Self::Unauthorized(e) => e.kind().as_str(),
        }
    }
}

impl IntoResponse for SignedError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Layer authenticating every request with a [`TokenService`].
#[derive(Debug, Clone)]
pub struct SignedLayer {
    tokens: Arc<TokenService>,
    max_body_bytes: usize,
}

impl SignedLayer {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self {
            tokens,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Cap on a body read as an envelope.
    pub fn max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }
}

impl<S> Layer<S> for SignedLayer {
    type Service = SignedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SignedService {
            inner,
            tokens: Arc::clone(&self.tokens),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// Service produced by [`SignedLayer`].
#[derive(Debug, Clone)]
pub struct SignedService<S> {
    inner: S,
    tokens: Arc<TokenService>,
    max_body_bytes: usize,
}

impl<S> Service<Request> for SignedService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let tokens = Arc::clone(&self.tokens);
        let max_body_bytes = self.max_body_bytes;
        // the clone is not ready; keep the one poll_ready was called on
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            let (token, body) = if is_mutating(&parts.method) {
                let bytes = match axum::body::to_bytes(body, max_body_bytes).await {
                    Ok(bytes) => bytes,
                    Err(e) => return Ok(SignedError::UnreadableBody(e.to_string()).into_response()),
                };
                (body_token(&bytes), Body::from(bytes))
            } else {
                (bearer_token(&parts.headers), body)
            };

            let Some(token) = token else {
                debug!(method = %parts.method, uri = %parts.uri, "request without token");
                return Ok(SignedError::MissingToken.into_response());
            };

            let verified = match tokens.verify(&token).await {
                Ok(verified) => verified,
                Err(e) => {
                    warn!(kind = %e.kind(), uri = %parts.uri, "signed request rejected");
                    return Ok(SignedError::Unauthorized(e).into_response());
                }
            };

            let mut req = Request::from_parts(parts, body);
            req.extensions_mut().insert(SignedRequest { token, verified });
            inner.call(req).await
        })
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn body_token(bytes: &Bytes) -> Option<String> {
    let token = std::str::from_utf8(bytes).ok()?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

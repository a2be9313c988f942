//! Authorization gate in front of `/redeem`.
//!
//! `open` lets every caller through as anonymous. `bearer` requires a shared
//! token, for deployments where a trusted frontend fronts the service.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::{AuthConfig, AuthMode};

/// Identity attached to requests that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    Bearer,
}

/// Decides whether a request may attempt a redemption.
pub trait AuthGate: Send + Sync {
    /// `None` rejects the request.
    fn authorize(&self, headers: &HeaderMap) -> Option<Caller>;
}

/// Admits everyone.
#[derive(Debug, Default)]
pub struct OpenGate;

impl AuthGate for OpenGate {
    fn authorize(&self, _headers: &HeaderMap) -> Option<Caller> {
        Some(Caller::Anonymous)
    }
}

/// Admits callers presenting `Authorization: Bearer <token>`.
pub struct BearerGate {
    token: String,
}

impl BearerGate {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl AuthGate for BearerGate {
    fn authorize(&self, headers: &HeaderMap) -> Option<Caller> {
        let presented = bearer_token(headers)?;
        constant_time_eq(presented.as_bytes(), self.token.as_bytes()).then_some(Caller::Bearer)
    }
}

impl std::fmt::Debug for BearerGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerGate").finish_non_exhaustive()
    }
}

/// Build the configured gate.
pub fn gate_from_config(config: &AuthConfig) -> Arc<dyn AuthGate> {
    match config.mode {
        AuthMode::Open => Arc::new(OpenGate),
        AuthMode::Bearer => Arc::new(BearerGate::new(config.bearer_token.clone())),
    }
}

/// Extract the token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Compare secrets without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn auth_middleware(
    State(gate): State<Arc<dyn AuthGate>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match gate.authorize(request.headers()) {
        Some(caller) => {
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        None => {
            tracing::warn!("Rejected unauthorized redemption attempt");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Unauthorized." })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_open_gate_admits_everyone() {
        assert_eq!(OpenGate.authorize(&HeaderMap::new()), Some(Caller::Anonymous));
    }

    #[test]
    fn test_bearer_gate() {
        let gate = BearerGate::new("s3cret");

        assert_eq!(gate.authorize(&headers_with("Bearer s3cret")), Some(Caller::Bearer));
        assert_eq!(gate.authorize(&headers_with("Bearer wrong")), None);
        assert_eq!(gate.authorize(&headers_with("Basic s3cret")), None);
        assert_eq!(gate.authorize(&HeaderMap::new()), None);
    }

    #[test]
    fn test_gate_from_config() {
        let config = AuthConfig {
            mode: AuthMode::Bearer,
            bearer_token: "abc".to_string(),
        };
        let gate = gate_from_config(&config);
        assert!(gate.authorize(&HeaderMap::new()).is_none());
        assert!(gate.authorize(&headers_with("Bearer abc")).is_some());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}

//! Authentication middleware for Axum
//!
//! Extracts a token from the request and validates it against the
//! `AuthStore`. Provides the `RequireAuth` extractor for handlers; the
//! terminal WebSocket hands the raw credential to the session orchestrator
//! instead so the rejection becomes a close code.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use termgate_core::{AuthError, AuthStore, Identity, IdentityVerifier};

/// Shared auth state, installed as a router `Extension`
#[derive(Clone)]
pub struct AuthState {
    pub store: Arc<AuthStore>,
    pub cookie_name: String,
}

impl AuthState {
    pub fn new(store: Arc<AuthStore>, cookie_name: impl Into<String>) -> Self {
        Self {
            store,
            cookie_name: cookie_name.into(),
        }
    }
}

/// JSON error response for auth failures
#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl AuthErrorResponse {
    fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Auth rejection type
pub struct AuthRejection {
    status: StatusCode,
    body: AuthErrorResponse,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<AuthError> for AuthRejection {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => AuthRejection {
                status: StatusCode::UNAUTHORIZED,
                body: AuthErrorResponse::new(
                    "Authentication required. Provide Authorization: Bearer <token> or X-API-Key header.",
                    "UNAUTHORIZED",
                ),
            },
            AuthError::InvalidCredentials | AuthError::InvalidHash(_) => AuthRejection {
                status: StatusCode::UNAUTHORIZED,
                body: AuthErrorResponse::new("Invalid token or API key", "INVALID_CREDENTIALS"),
            },
            AuthError::TokenRevoked => AuthRejection {
                status: StatusCode::UNAUTHORIZED,
                body: AuthErrorResponse::new("Token has been revoked", "TOKEN_REVOKED"),
            },
            AuthError::Internal(msg) => AuthRejection {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: AuthErrorResponse::new(msg, "INTERNAL_ERROR"),
            },
        }
    }
}

// ============================================================================
// RequireAuth Extractor
// ============================================================================

/// Axum extractor that requires authentication.
///
/// When auth is disabled every request is the anonymous identity.
pub struct RequireAuth(pub Identity);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let auth = parts
            .extensions
            .get::<AuthState>()
            .ok_or_else(|| AuthError::Internal("AuthStore not configured".to_string()))?;

        let credential = extract_credential(&parts.headers, &parts.uri, &auth.cookie_name);
        let identity = auth.store.verify(credential.as_deref())?;
        Ok(RequireAuth(identity))
    }
}

/// Extract a credential from request headers or query params
///
/// Checked in order:
/// 1. `Authorization: Bearer <token>` header
/// 2. `X-API-Key: <key>` header
/// 3. the session cookie
/// 4. `?token=<token>` query parameter (for WebSocket connections)
pub fn extract_credential(headers: &HeaderMap, uri: &Uri, cookie_name: &str) -> Option<String> {
    if let Some(value) = header_str(headers, header::AUTHORIZATION.as_str()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    if let Some(value) = header_str(headers, "x-api-key") {
        return Some(value.trim().to_string());
    }

    for cookies in headers.get_all(header::COOKIE) {
        let Ok(cookies) = cookies.to_str() else {
            continue;
        };
        for pair in cookies.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name == cookie_name && !value.is_empty() {
                    return Some(value.trim_matches('"').to_string());
                }
            }
        }
    }

    if let Some(query) = uri.query() {
        for param in query.split('&') {
            if let Some(token) = param.strip_prefix("token=") {
                return Some(token.to_string());
            }
        }
    }

    None
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

use axum::{
    extract::{FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::Middleware;
use crate::auth::{TokenError, TokenPayload, TokenSigner};
use crate::error::ApiError;

pub const MISSING_BEARER: &str = "NO AUTHORIZATION HEADER WITH BEARER TOKEN";
pub const AUTH_FAILED: &str = "Failed Authentication";

/// Bearer-token middleware: verifies `Authorization: Bearer <token>` with `signer` and
/// stores the decoded [`TokenPayload`] in the request extensions.
pub fn bearer_auth(signer: TokenSigner) -> Middleware {
    let signer = Arc::new(signer);
    Middleware::new(move |request: Request, next: Next| {
        let signer = signer.clone();
        async move { authenticate(&signer, request, next).await }
    })
}

async fn authenticate(signer: &TokenSigner, mut request: Request, next: Next) -> Response {
    let token = match extract_bearer_token(request.headers()) {
        Some(token) => token,
        None => {
            tracing::warn!(path = %request.uri().path(), "request without bearer token");
            return ApiError::unauthorized(MISSING_BEARER).into_response();
        }
    };

    match signer.verify(token) {
        Ok(payload) => {
            request.extensions_mut().insert(payload);
            next.run(request).await
        }
        Err(TokenError::EmptyPayload) => ApiError::unauthorized(AUTH_FAILED).into_response(),
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), "token verification failed: {}", e);
            ApiError::from(e).into_response()
        }
    }
}

/// Extract JWT token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}

/// Handlers behind [`bearer_auth`] can take the caller's payload as an extractor.
#[axum::async_trait]
impl<S> FromRequestParts<S> for TokenPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TokenPayload>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized(AUTH_FAILED))
    }
}

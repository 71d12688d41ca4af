use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use stockhook_core::constants::{TOKEN_HEADER, TOKEN_QUERY_PARAM};
use stockhook_core::AppError;
use subtle::ConstantTimeEq;

use crate::error::HttpAppError;

const BEARER_PREFIX: &str = "bearer ";

#[derive(Clone)]
pub struct AuthState {
    /// Shared ingestion secret. `None` rejects every request.
    pub token: Option<String>,
}

impl AuthState {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

/// Compare digests so neither the content nor the length of the secret leaks
/// through timing.
fn secure_compare(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());
    a.as_slice().ct_eq(b.as_slice()).into()
}

/// The credential a caller presented: the dedicated header, then a bearer
/// `Authorization` header, then the query parameter. The first non-empty one wins.
pub fn presented_credential(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let from_header = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    let from_bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .and_then(|auth| {
            let prefix = auth.get(..BEARER_PREFIX.len())?;
            prefix
                .eq_ignore_ascii_case(BEARER_PREFIX)
                .then(|| auth[BEARER_PREFIX.len()..].trim())
        })
        .filter(|s| !s.is_empty());
    if let Some(token) = from_bearer {
        return Some(token.to_string());
    }

    Query::<HashMap<String, String>>::try_from_uri(uri)
        .ok()
        .and_then(|Query(params)| params.get(TOKEN_QUERY_PARAM).cloned())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Reject requests that do not carry the configured ingestion token.
///
/// Fails closed: without a configured token every request gets 503.
pub async fn require_token(
    State(auth_state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = auth_state.token.as_deref() else {
        return HttpAppError(AppError::ServiceUnavailable(
            "ingestion token not configured".to_string(),
        ))
        .into_response();
    };

    match presented_credential(request.headers(), request.uri()) {
        Some(presented) if secure_compare(&presented, expected) => next.run(request).await,
        Some(_) => HttpAppError(AppError::Unauthorized("token mismatch".to_string()))
            .into_response(),
        None => HttpAppError(AppError::Unauthorized("missing token".to_string()))
            .into_response(),
    }
}

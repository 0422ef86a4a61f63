//! Authentication extractor.
//!
//! Producers authenticate with a static bearer token. The check runs on the
//! request head, so an unauthenticated request is refused before its body is
//! read or decompressed.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::state::AppState;

/// Proof that the request carried the configured bearer token.
#[derive(Debug, Clone, Copy)]
pub struct BearerAuth;

impl FromRequestParts<Arc<AppState>> for BearerAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(ApiError::Unauthorized("missing authorization header"))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("malformed authorization header"))?;

        let token = bearer_token(header)?;

        if !tokens_match(token.as_bytes(), state.config.analytics_token.as_bytes()) {
            tracing::debug!("Rejected request with wrong bearer token");
            return Err(ApiError::Forbidden);
        }

        Ok(Self)
    }
}

/// Extract the token from a `Bearer <token>` header value.
fn bearer_token(header: &str) -> Result<&str, ApiError> {
    let (scheme, token) = header.trim().split_once(' ').unwrap_or((header.trim(), ""));

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiError::Unauthorized("authorization scheme must be Bearer"));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::Unauthorized("empty bearer token"));
    }

    Ok(token)
}

/// Compare without short-circuiting on the first differing byte.
fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_is_case_insensitive() {
        assert_eq!(bearer_token("bearer abc").unwrap(), "abc");
        assert_eq!(bearer_token("BEARER   abc ").unwrap(), "abc");
    }

    #[test]
    fn other_schemes_are_refused() {
        assert!(matches!(
            bearer_token("Basic dXNlcjpwYXNz"),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(bearer_token("abc"), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn empty_token_is_refused() {
        assert!(matches!(bearer_token("Bearer"), Err(ApiError::Unauthorized(_))));
        assert!(matches!(bearer_token("Bearer   "), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn token_comparison() {
        assert!(tokens_match(b"secret", b"secret"));
        assert!(!tokens_match(b"secret", b"secreT"));
        assert!(!tokens_match(b"secret", b"secret2"));
    }
}

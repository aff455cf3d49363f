use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::handlers::AppState;
use crate::model::Session;
use crate::store::traits::Store;

/// Axum extractor guarding admin routes.
///
/// The request must carry `Authorization: Bearer <token>` where the token is
/// the access token of the session currently held by the application's
/// session context. Anything else is rejected with 401.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<Arc<AppState<S>>> for AdminSession
where
    S: Store + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        match state.sessions.current() {
            Some(session) if session.accepts_token(&token) => Ok(AdminSession(session)),
            Some(_) => Err(ApiError::Unauthorized("token does not match the active session".to_string())),
            None => Err(ApiError::Unauthorized("no active admin session".to_string())),
        }
    }
}

/// Extract the bearer token from the authorization header
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123".to_string()));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}

//! Require a valid bearer token (e.g. `Authorization: Bearer <token>`) on write routes.

use crate::auth::Caller;
use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

/// Extractor for the authenticated caller. Rejects with 401 when the token is missing or invalid.
#[derive(Clone, Debug)]
pub struct AdminCaller(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for AdminCaller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                tracing::warn!(path = %parts.uri.path(), "missing bearer token");
                AppError::Unauthorized("missing bearer token".into())
            })?;
        let caller = state.auth.verify(token).map_err(|e| {
            tracing::warn!(path = %parts.uri.path(), "rejected bearer token");
            e
        })?;
        Ok(AdminCaller(caller))
    }
}

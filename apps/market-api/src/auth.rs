//! Token authentication module.
//!
//! Callers authenticate with `Authorization: Token <key>`; the key is looked
//! up in `user_tokens`. Handlers take [`Caller`] for any account or
//! [`Supplier`] for shop-only endpoints.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use market_core::User;
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Authenticated account of any kind.
#[derive(Debug, Clone)]
pub struct Caller(pub User);

/// Authenticated account of kind `shop`.
#[derive(Debug, Clone)]
pub struct Supplier(pub User);

/// Extract the key from a `Token <key>` authorization header.
pub fn extract_token(auth_header: &str) -> Option<&str> {
    let key = auth_header.strip_prefix("Token ")?.trim();
    (!key.is_empty()).then_some(key)
}

async fn resolve(parts: &Parts, state: &AppState) -> Result<User, ApiError> {
    let key = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_token)
        .ok_or(ApiError::Unauthorized)?;

    match state.db.users().find_by_token(key).await? {
        Some(user) => Ok(user),
        None => {
            debug!("Unknown API token");
            Err(ApiError::Unauthorized)
        }
    }
}

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state).await.map(Caller)
    }
}

impl FromRequestParts<Arc<AppState>> for Supplier {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = resolve(parts, state).await?;
        if !user.is_supplier() {
            return Err(ApiError::Forbidden);
        }
        Ok(Supplier(user))
    }
}

//! Bearer token authentication
//!
//! Handlers that take an [`AuthUser`] argument require
//! `Authorization: Bearer <jwt>`:
//! - missing or malformed header → 401
//! - bad signature or expired token → 401 "Token decode error"
//! - token without a subject → 401 "Invalid token"
//! - subject no longer exists → 404 "User not found"

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;
use uuid::Uuid;

use crate::db::users::{self, User};
use crate::{ApiError, AppState};

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0.guid
    }
}

/// Extract the token from an `Authorization` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        let claims = state.tokens.verify(token).map_err(|e| {
            debug!(error = %e, "Rejected token");
            ApiError::Unauthorized("Token decode error".to_string())
        })?;

        let user_id = claims
            .sub
            .as_deref()
            .and_then(|sub| Uuid::parse_str(sub).ok())
            .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))?;

        let user = users::load_user(&state.db, &user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}

//! HTTP API handlers for kkd-server
//!
//! Public routes: register, login, board reads, seminars, health.
//! Everything else takes an [`AuthUser`] and therefore requires a bearer
//! token.

pub mod auth;
pub mod comments;
pub mod health;
pub mod posts;
pub mod reports;
pub mod seminars;
pub mod users;

pub use auth::AuthUser;
pub use health::{get_build_info, BuildInfo};
pub use comments::comment_routes;
pub use health::health_routes;
pub use posts::post_routes;
pub use reports::report_routes;
pub use seminars::seminar_routes;
pub use users::user_routes;

use serde::Serialize;
use uuid::Uuid;

use crate::ApiError;

/// `{"message": ...}` response body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Parse an id taken from the path or body; malformed ids are a client error
pub(crate) fn parse_id(value: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid {} id: {}", what, value)))
}

/// Trimmed value, `None` when blank
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

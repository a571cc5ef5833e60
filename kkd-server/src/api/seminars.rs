//! Seminar listing endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::services::Seminar;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct SeminarListResponse {
    pub projects: Vec<Seminar>,
}

/// GET /seminars
///
/// 503 when no source is configured, 502 when the source fails and nothing
/// is cached.
pub async fn list_seminars(State(state): State<AppState>) -> ApiResult<Json<SeminarListResponse>> {
    let service = state.seminars.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("Seminar source is not configured".to_string())
    })?;

    let projects = service.list().await?;

    Ok(Json(SeminarListResponse { projects }))
}

/// Build seminar routes
pub fn seminar_routes() -> Router<AppState> {
    Router::new().route("/seminars", get(list_seminars))
}

//! Damage report endpoints
//!
//! `POST /report-damage` takes multipart form data:
//!
//! | field          | required | notes                                   |
//! |----------------|----------|-----------------------------------------|
//! | `category`     | yes      | `재난/재해`, `병해충`, `disaster`, `pest` |
//! | `sub_category` | no       |                                         |
//! | `title`        | no       |                                         |
//! | `content`      | no       |                                         |
//! | `local`        | no       | free-form location                      |
//! | `latitude`     | no       | -90..=90                                |
//! | `longitude`    | no       | -180..=180                              |
//! | `detect`       | no       | default true                            |
//! | `files`        | yes      | one part per photo                      |
//!
//! Every photo is validated before any is written. Detection runs only for
//! pest reports, and its failure is recorded on the report instead of
//! failing the request.

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use super::users::multipart_error;
use super::{non_blank, parse_id, AuthUser};
use crate::db::{
    self,
    reports::{DamageReport, ReportCategory},
    users::User,
};
use crate::services::uploads::{report_file_name, UploadKind};
use crate::services::{DetectionOutcome, ImageInfo, StoredFile, UploadError};
use crate::{ApiError, ApiResult, AppState};
use kkd_common::time;

/// Parsed multipart form
#[derive(Debug, Default)]
pub struct ReportForm {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub local: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub detect: Option<String>,
    pub files: Vec<(String, Bytes)>,
}

#[derive(Debug, Serialize)]
pub struct ReportCreatedResponse {
    pub message: String,
    pub report_id: String,
    pub files: Vec<StoredFile>,
    pub detection: DetectionOutcome,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub main_category: ReportCategory,
    pub sub_category: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub local: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub files: Vec<String>,
    pub detection: DetectionOutcome,
    pub created_at: String,
}

impl From<DamageReport> for ReportResponse {
    fn from(report: DamageReport) -> Self {
        Self {
            id: report.guid.to_string(),
            user_id: report.user_id.to_string(),
            username: report.username,
            main_category: report.main_category,
            sub_category: report.sub_category,
            title: report.title,
            content: report.content,
            local: report.local,
            latitude: report.latitude,
            longitude: report.longitude,
            files: report.files,
            detection: report.detection,
            created_at: time::to_db(&report.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportListResponse {
    pub reports: Vec<ReportResponse>,
}

/// Parse an optional coordinate and check its range
pub fn parse_coordinate(value: Option<&str>, name: &str, limit: f64) -> ApiResult<Option<f64>> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let parsed: f64 = raw
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("{} must be a number", name)))?;

    if !parsed.is_finite() || parsed.abs() > limit {
        return Err(ApiError::BadRequest(format!(
            "{} must be between -{} and {}",
            name, limit, limit
        )));
    }

    Ok(Some(parsed))
}

/// Parse a form boolean; absent means true
pub fn parse_flag(value: Option<&str>) -> ApiResult<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(true),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(ApiError::BadRequest(format!("Invalid detect flag: {}", other))),
    }
}

async fn read_form(state: &AppState, mut multipart: Multipart) -> ApiResult<ReportForm> {
    let mut form = ReportForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "files" | "file" => {
                let file_name = non_blank(field.file_name().map(str::to_string))
                    .unwrap_or_else(|| format!("photo_{}", form.files.len() + 1));
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.files.push((file_name, bytes));
                state.uploads.check_file_count(form.files.len())?;
            }
            _ => {
                let value = field.text().await.map_err(multipart_error)?;
                let slot = match name.as_str() {
                    "category" | "main_category" => &mut form.category,
                    "sub_category" => &mut form.sub_category,
                    "title" => &mut form.title,
                    "content" => &mut form.content,
                    "local" => &mut form.local,
                    "latitude" => &mut form.latitude,
                    "longitude" => &mut form.longitude,
                    "detect" => &mut form.detect,
                    _ => continue,
                };
                *slot = Some(value);
            }
        }
    }

    Ok(form)
}

/// Write the photos and run detection
///
/// Every file written is pushed to `stored` as soon as it exists, so the
/// caller can discard them if anything later fails.
async fn persist_report(
    state: &AppState,
    user: &User,
    category: ReportCategory,
    detect: bool,
    validated: &[(String, Bytes, ImageInfo)],
    received_at: DateTime<Utc>,
    stored: &mut Vec<StoredFile>,
) -> ApiResult<DamageReport> {
    for (idx, (name, bytes, info)) in validated.iter().enumerate() {
        let stamp = received_at + Duration::microseconds(idx as i64);
        let stored_name = report_file_name(name, &stamp);
        stored.push(
            state
                .uploads
                .save(UploadKind::Report, &stored_name, bytes, info)
                .await?,
        );
    }
    let urls: Vec<String> = stored.iter().map(|f| f.url.clone()).collect();

    let detection = match (&state.detection, category, detect) {
        (_, _, false) => DetectionOutcome::skipped("Detection not requested"),
        (_, ReportCategory::Disaster, true) => {
            DetectionOutcome::skipped("Detection runs only for pest reports")
        }
        (None, ReportCategory::Pest, true) => {
            DetectionOutcome::skipped("Detector is not configured")
        }
        (Some(pipeline), ReportCategory::Pest, true) => pipeline.run(&urls).await,
    };

    let mut report = DamageReport::new(user, category);
    report.files = urls;
    report.detection = detection;
    report.created_at = received_at;
    Ok(report)
}

/// POST /report-damage
pub async fn report_damage(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> ApiResult<Json<ReportCreatedResponse>> {
    let form = read_form(&state, multipart).await?;

    let category: ReportCategory = non_blank(form.category)
        .ok_or_else(|| ApiError::BadRequest("category is required".to_string()))?
        .parse()
        .map_err(ApiError::BadRequest)?;
    let latitude = parse_coordinate(form.latitude.as_deref(), "latitude", 90.0)?;
    let longitude = parse_coordinate(form.longitude.as_deref(), "longitude", 180.0)?;
    let detect = parse_flag(form.detect.as_deref())?;

    if form.files.is_empty() {
        return Err(ApiError::BadRequest("At least one file is required".to_string()));
    }

    // Validate everything before writing anything
    let validated: Vec<(String, Bytes, ImageInfo)> = form
        .files
        .into_iter()
        .map(|(name, bytes)| -> Result<_, UploadError> {
            let info = state.uploads.validate_image(&name, &bytes)?;
            Ok((name, bytes, info))
        })
        .collect::<Result<_, _>>()?;

    let received_at = time::now();
    let mut stored = Vec::with_capacity(validated.len());
    let saved = persist_report(
        &state,
        &user,
        category,
        detect,
        &validated,
        received_at,
        &mut stored,
    )
    .await;

    let mut report = match saved {
        Ok(report) => report,
        Err(e) => {
            state.uploads.discard(&stored).await;
            return Err(e);
        }
    };
    report.sub_category = non_blank(form.sub_category);
    report.title = non_blank(form.title);
    report.content = non_blank(form.content);
    report.local = non_blank(form.local);
    report.latitude = latitude;
    report.longitude = longitude;

    if let Err(e) = db::reports::insert_report(&state.db, &report).await {
        state.uploads.discard(&stored).await;
        return Err(e.into());
    }

    info!(
        report_id = %report.guid,
        user_id = %user.guid,
        category = %category,
        files = stored.len(),
        detection = report.detection.status.as_str(),
        "Damage report received"
    );

    Ok(Json(ReportCreatedResponse {
        message: "신고가 성공적으로 접수되었습니다.".to_string(),
        report_id: report.guid.to_string(),
        files: stored,
        detection: report.detection,
    }))
}

/// GET /reports/mine
pub async fn list_my_reports(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<ReportListResponse>> {
    let reports = db::reports::list_reports_by_user(&state.db, &user.guid).await?;

    Ok(Json(ReportListResponse {
        reports: reports.into_iter().map(ReportResponse::from).collect(),
    }))
}

/// GET /reports/:report_id
///
/// Only the reporter may read a report.
pub async fn get_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(report_id): Path<String>,
) -> ApiResult<Json<ReportResponse>> {
    let report_id = parse_id(&report_id, "report")?;
    let report = db::reports::load_report(&state.db, &report_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Report not found".to_string()))?;

    if report.user_id != user.guid {
        return Err(ApiError::Forbidden("Not your report".to_string()));
    }

    Ok(Json(ReportResponse::from(report)))
}

/// Build damage report routes
pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/report-damage", post(report_damage))
        .route("/reports/mine", get(list_my_reports))
        .route("/reports/:report_id", get(get_report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate(None, "latitude", 90.0).unwrap(), None);
        assert_eq!(parse_coordinate(Some("  "), "latitude", 90.0).unwrap(), None);
        assert_eq!(
            parse_coordinate(Some("37.5665"), "latitude", 90.0).unwrap(),
            Some(37.5665)
        );
        assert_eq!(
            parse_coordinate(Some("-180"), "longitude", 180.0).unwrap(),
            Some(-180.0)
        );
        assert!(parse_coordinate(Some("90.01"), "latitude", 90.0).is_err());
        assert!(parse_coordinate(Some("north"), "latitude", 90.0).is_err());
        assert!(parse_coordinate(Some("NaN"), "latitude", 90.0).is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(None).unwrap());
        assert!(parse_flag(Some("TRUE")).unwrap());
        assert!(!parse_flag(Some("false")).unwrap());
        assert!(!parse_flag(Some("0")).unwrap());
        assert!(parse_flag(Some("maybe")).is_err());
    }
}

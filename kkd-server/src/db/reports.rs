//! Damage reports

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::users::User;
use super::{parse_guid, parse_timestamp};
use crate::services::{DetectionOutcome, DetectionStatus};
use kkd_common::time;

/// Main report category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportCategory {
    /// 재난/재해
    #[serde(rename = "재난/재해")]
    Disaster,
    /// 병해충
    #[serde(rename = "병해충")]
    Pest,
}

impl ReportCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ReportCategory::Disaster => "재난/재해",
            ReportCategory::Pest => "병해충",
        }
    }
}

impl fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ReportCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "재난/재해" => Ok(ReportCategory::Disaster),
            "병해충" => Ok(ReportCategory::Pest),
            other if other.eq_ignore_ascii_case("disaster") => Ok(ReportCategory::Disaster),
            other if other.eq_ignore_ascii_case("pest") => Ok(ReportCategory::Pest),
            other => Err(format!("Unknown report category {:?}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DamageReport {
    pub guid: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub main_category: ReportCategory,
    pub sub_category: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    /// Free-form location text
    pub local: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Public URLs of the stored photos
    pub files: Vec<String>,
    pub detection: DetectionOutcome,
    pub created_at: DateTime<Utc>,
}

impl DamageReport {
    pub fn new(reporter: &User, main_category: ReportCategory) -> Self {
        Self {
            guid: Uuid::new_v4(),
            user_id: reporter.guid,
            username: reporter.username.clone(),
            main_category,
            sub_category: None,
            title: None,
            content: None,
            local: None,
            latitude: None,
            longitude: None,
            files: Vec::new(),
            detection: DetectionOutcome::skipped("Detection not requested"),
            created_at: time::now(),
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let guid: String = row.get("guid");
        let user_id: String = row.get("user_id");
        let category: String = row.get("main_category");
        let files: String = row.get("files");
        let status: String = row.get("detection_status");
        let detections: String = row.get("detections");
        let created_at: String = row.get("created_at");

        let status = DetectionStatus::parse(&status)
            .ok_or_else(|| anyhow!("Invalid stored detection status {:?}", status))?;

        Ok(Self {
            guid: parse_guid(&guid)?,
            user_id: parse_guid(&user_id)?,
            username: row.get("username"),
            main_category: category.parse().map_err(|e: String| anyhow!(e))?,
            sub_category: row.get("sub_category"),
            title: row.get("title"),
            content: row.get("content"),
            local: row.get("local"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            files: serde_json::from_str(&files).context("Invalid stored report files")?,
            detection: DetectionOutcome {
                status,
                message: row.get("detection_message"),
                results: serde_json::from_str(&detections)
                    .context("Invalid stored detection results")?,
            },
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

const REPORT_COLUMNS: &str = "guid, user_id, username, main_category, sub_category, title, \
                              content, local, latitude, longitude, files, detection_status, \
                              detection_message, detections, created_at";

pub async fn insert_report(pool: &SqlitePool, report: &DamageReport) -> Result<()> {
    let files = serde_json::to_string(&report.files)?;
    let detections = serde_json::to_string(&report.detection.results)?;

    sqlx::query(
        r#"
        INSERT INTO damage_reports (
            guid, user_id, username, main_category, sub_category, title, content, local,
            latitude, longitude, files, detection_status, detection_message, detections,
            created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.guid.to_string())
    .bind(report.user_id.to_string())
    .bind(&report.username)
    .bind(report.main_category.label())
    .bind(&report.sub_category)
    .bind(&report.title)
    .bind(&report.content)
    .bind(&report.local)
    .bind(report.latitude)
    .bind(report.longitude)
    .bind(&files)
    .bind(report.detection.status.as_str())
    .bind(&report.detection.message)
    .bind(&detections)
    .bind(time::to_db(&report.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_report(pool: &SqlitePool, guid: &Uuid) -> Result<Option<DamageReport>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM damage_reports WHERE guid = ?",
        REPORT_COLUMNS
    ))
    .bind(guid.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(DamageReport::from_row).transpose()
}

/// A user's reports, newest first
pub async fn list_reports_by_user(pool: &SqlitePool, user_id: &Uuid) -> Result<Vec<DamageReport>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM damage_reports WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        REPORT_COLUMNS
    ))
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(DamageReport::from_row).collect()
}

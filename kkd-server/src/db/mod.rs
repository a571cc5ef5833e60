//! Repositories for kkd-server
//!
//! Thin query modules over the shared SQLite schema created by
//! `kkd_common::db::init_schema`. Ids are stored as UUID strings and
//! timestamps as RFC 3339 text (see `kkd_common::time`).

pub mod comments;
pub mod likes;
pub mod posts;
pub mod reports;
pub mod users;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub(crate) fn parse_guid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).with_context(|| format!("Invalid stored id {:?}", value))
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(kkd_common::time::from_db(value)?)
}

/// True when the error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

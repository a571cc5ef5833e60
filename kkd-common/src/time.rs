//! Timestamp utilities
//!
//! All timestamps are stored as RFC 3339 UTC strings with microsecond
//! precision so that lexical order matches chronological order.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::{Error, Result};

/// Display format used by board listings
pub const BOARD_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Current UTC time, truncated to the stored precision
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Encode a timestamp for database storage
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a timestamp read from the database
pub fn from_db(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Timestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Format a timestamp for board listings (`2024-05-01 09:30`)
pub fn board_format(ts: &DateTime<Utc>) -> String {
    ts.format(BOARD_FORMAT).to_string()
}

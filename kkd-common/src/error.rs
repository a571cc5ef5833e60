//! Shared error type for kkd-common

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bootstrap file unreadable or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored timestamp column failed to parse
    #[error("Invalid stored timestamp {value:?}: {reason}")]
    Timestamp { value: String, reason: String },

    /// Region code outside the table
    #[error("Unknown region code: {0}")]
    UnknownRegion(i64),
}

//! # Kkodurami Common Library
//!
//! Shared code for the Kkodurami backend including:
//! - Database initialization and the settings table
//! - Configuration loading and root folder resolution
//! - Region code table
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod regions;
pub mod time;

pub use error::{Error, Result};

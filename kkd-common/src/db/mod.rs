//! Database initialization and shared tables

pub mod init;
pub mod settings;

pub use init::{init_database, init_in_memory, init_schema, SCHEMA_VERSION};
pub use settings::{get_setting, set_setting};

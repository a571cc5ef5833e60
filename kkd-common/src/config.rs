//! Configuration loading and root folder resolution
//!
//! Two tiers:
//! 1. **TOML bootstrap**: listen address, root folder, upload limits,
//!    detector and scraper endpoints, logging (read once at startup)
//! 2. **Database settings**: values generated at runtime and persisted in the
//!    `settings` table (see [`crate::db::settings`])
//!
//! A missing TOML file is not an error: every section has built-in defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "KKD_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "kkodurami.db";

/// Static asset directory inside the root folder
pub const STATIC_DIR: &str = "static";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder holding the database and uploaded files
    pub root_folder: Option<PathBuf>,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub uploads: UploadConfig,
    pub detector: DetectorConfig,
    pub seminars: SeminarConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a whole request body, multipart uploads included
    pub max_body_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_mb: 50,
        }
    }
}

/// Session token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret; generated and stored in the database when absent
    pub jwt_secret: Option<String>,
    pub token_ttl_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_minutes: 30,
        }
    }
}

/// Upload limits for report photos and profile images
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_file_mb: usize,
    pub max_files: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_mb: 10,
            max_files: 10,
        }
    }
}

/// Object-detection service settings
///
/// Detection is disabled when `endpoint` is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub endpoint: Option<String>,
    pub confidence_threshold: f64,
    pub max_detections: usize,
    pub timeout_secs: u64,
    /// Class names indexed by class id, used when the detector omits names
    pub labels: Vec<String>,
    /// Public origin under which `/static` is reachable, e.g. `https://api.example.org`
    pub public_base_url: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            confidence_threshold: 0.25,
            max_detections: 50,
            timeout_secs: 30,
            labels: Vec::new(),
            public_base_url: None,
        }
    }
}

/// Seminar listing scraper settings
///
/// The `/seminars` endpoint is unavailable when `source_url` is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeminarConfig {
    pub source_url: Option<String>,
    pub item_selector: String,
    pub cache_ttl_secs: u64,
    pub timeout_secs: u64,
}

impl Default for SeminarConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            item_selector: "td.subject a".to_string(),
            cache_ttl_secs: 600,
            timeout_secs: 15,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration from an explicit path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration with graceful degradation
    ///
    /// An explicit path must exist and parse. Without one, the platform
    /// config locations are tried and defaults are used when none is found
    /// or the discovered file is invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        for candidate in default_config_paths() {
            if !candidate.exists() {
                continue;
            }
            match Self::from_file(&candidate) {
                Ok(config) => {
                    info!("Loaded configuration from {}", candidate.display());
                    return Ok(config);
                }
                Err(e) => {
                    warn!("Ignoring invalid config {}: {}", candidate.display(), e);
                }
            }
        }

        warn!("No configuration file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Upload size limit in bytes
    pub fn max_file_bytes(&self) -> usize {
        self.uploads.max_file_mb * 1024 * 1024
    }

    /// Request body limit in bytes
    pub fn max_body_bytes(&self) -> usize {
        self.server.max_body_mb * 1024 * 1024
    }
}

/// Candidate config file locations, highest priority first
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("kkodurami").join("config.toml"));
    }
    if cfg!(unix) {
        paths.push(PathBuf::from("/etc/kkodurami/config.toml"));
    }
    paths
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("kkodurami"))
        .unwrap_or_else(|| PathBuf::from("./kkodurami_data"))
}

/// Root folder resolution
///
/// Priority order:
/// 1. Command-line argument
/// 2. `KKD_ROOT_FOLDER` environment variable
/// 3. TOML `root_folder`
/// 4. OS-dependent default
pub struct RootFolderResolver<'a> {
    cli_arg: Option<PathBuf>,
    toml: Option<&'a TomlConfig>,
}

impl<'a> RootFolderResolver<'a> {
    pub fn new() -> Self {
        Self {
            cli_arg: None,
            toml: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &'a TomlConfig) -> Self {
        self.toml = Some(config);
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = self.toml.and_then(|c| c.root_folder.clone()) {
            return path;
        }

        default_root_folder()
    }
}

impl Default for RootFolderResolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Directory layout under the root folder
#[derive(Debug, Clone)]
pub struct RootFolder {
    root: PathBuf,
}

impl RootFolder {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn static_dir(&self) -> PathBuf {
        self.root.join(STATIC_DIR)
    }

    /// Create the root and static directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.static_dir())?;
        Ok(())
    }
}

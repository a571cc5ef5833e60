//! kkd-server library interface
//!
//! Exposes the router and application state for the binary and for
//! integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use kkd_common::config::{RootFolder, TomlConfig};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use url::Url;

use crate::services::{
    DetectionPipeline, DetectionSettings, Detector, HttpDetector, SeminarService, TokenIssuer,
    UploadStore,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Session token issuer/verifier
    pub tokens: Arc<TokenIssuer>,
    /// Upload validation and storage under `<root>/static`
    pub uploads: Arc<UploadStore>,
    /// Damage-report detection; `None` when no detector is configured
    pub detection: Option<Arc<DetectionPipeline>>,
    /// Seminar scraper; `None` when no source is configured
    pub seminars: Option<Arc<SeminarService>>,
    /// Request body limit in bytes
    pub max_body_bytes: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, tokens: TokenIssuer, uploads: UploadStore) -> Self {
        Self {
            db,
            tokens: Arc::new(tokens),
            uploads: Arc::new(uploads),
            detection: None,
            seminars: None,
            max_body_bytes: 50 * 1024 * 1024,
            startup_time: Utc::now(),
        }
    }

    /// Enable detection with the given detector
    pub fn with_detector(mut self, detector: Arc<dyn Detector>, settings: DetectionSettings) -> Self {
        self.detection = Some(Arc::new(DetectionPipeline::new(
            detector,
            settings,
            self.uploads.clone(),
        )));
        self
    }

    pub fn with_seminars(mut self, service: SeminarService) -> Self {
        self.seminars = Some(Arc::new(service));
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Assemble state from bootstrap configuration
    pub async fn from_config(
        db: SqlitePool,
        config: &TomlConfig,
        root: &RootFolder,
    ) -> anyhow::Result<Self> {
        let secret = crate::config::resolve_jwt_secret(&db, config).await?;
        let tokens = TokenIssuer::new(
            &secret,
            chrono::Duration::minutes(config.auth.token_ttl_minutes),
        );

        let mut uploads = UploadStore::new(
            root.static_dir(),
            config.max_file_bytes(),
            config.uploads.max_files,
        );
        if let Some(base) = &config.detector.public_base_url {
            let base = Url::parse(base)
                .with_context(|| format!("Invalid detector.public_base_url {:?}", base))?;
            uploads = uploads.with_public_base_url(base);
        }

        let mut state =
            Self::new(db, tokens, uploads).with_max_body_bytes(config.max_body_bytes());

        match &config.detector.endpoint {
            Some(endpoint) => {
                let detector = HttpDetector::new(
                    endpoint.clone(),
                    Duration::from_secs(config.detector.timeout_secs),
                )?;
                let settings = DetectionSettings {
                    confidence_threshold: config.detector.confidence_threshold,
                    max_detections: config.detector.max_detections,
                    labels: config.detector.labels.clone(),
                };
                info!(endpoint = %endpoint, "Damage detection enabled");
                state = state.with_detector(Arc::new(detector), settings);
            }
            None => warn!("No detector endpoint configured, damage detection disabled"),
        }

        match &config.seminars.source_url {
            Some(source) => {
                let source = Url::parse(source)
                    .with_context(|| format!("Invalid seminars.source_url {:?}", source))?;
                let service = SeminarService::new(
                    source,
                    &config.seminars.item_selector,
                    Duration::from_secs(config.seminars.cache_ttl_secs),
                    Duration::from_secs(config.seminars.timeout_secs),
                )?;
                info!(source = %service.source(), "Seminar listing enabled");
                state = state.with_seminars(service);
            }
            None => warn!("No seminar source configured, /seminars disabled"),
        }

        Ok(state)
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let static_dir = ServeDir::new(state.uploads.static_root());
    let body_limit = state.max_body_bytes;

    Router::new()
        .merge(api::user_routes())
        .merge(api::post_routes())
        .merge(api::comment_routes())
        .merge(api::report_routes())
        .merge(api::seminar_routes())
        .merge(api::health_routes())
        .nest_service("/static", static_dir)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

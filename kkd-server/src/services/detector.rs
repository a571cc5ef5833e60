//! Object-detection model client
//!
//! The pretrained detector runs as a separate model-serving process. This
//! module only speaks to it: the image bytes are POSTed as the request body
//! and the service answers with raw predictions.
//!
//! Expected response shape (field aliases cover common serving wrappers):
//!
//! ```json
//! {
//!   "normalized": false,
//!   "detections": [
//!     {"class": 3, "name": "aphid", "confidence": 0.91, "bbox": [12.0, 30.5, 88.0, 140.0]}
//!   ]
//! }
//! ```
//!
//! Boxes are `[x1, y1, x2, y2]`, in pixels unless `normalized` is set.
//! Filtering, scaling and labelling happen in [`crate::services::detection`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("kkodurami/", env!("CARGO_PKG_VERSION"));

/// Detector errors
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Model service returned an error response
    #[error("Detector API error {0}: {1}")]
    Api(u16, String),

    /// Response body was not a prediction list
    #[error("Parse error: {0}")]
    Parse(String),

    /// Stored photo could not be resolved or decoded
    #[error("Invalid input image: {0}")]
    Input(String),

    /// Image could not be read from disk
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One prediction as returned by the model service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(alias = "class", alias = "cls")]
    pub class_id: i64,
    #[serde(default, alias = "name")]
    pub label: Option<String>,
    #[serde(alias = "conf", alias = "score")]
    pub confidence: f64,
    /// `[x1, y1, x2, y2]`
    #[serde(alias = "xyxy", alias = "box")]
    pub bbox: [f64; 4],
}

/// Raw predictions for one image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDetections {
    /// Boxes are fractions of the image size instead of pixels
    #[serde(default)]
    pub normalized: bool,
    #[serde(default, alias = "predictions", alias = "results")]
    pub detections: Vec<RawDetection>,
}

/// Object detector
#[async_trait]
pub trait Detector: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Run inference on one encoded image
    async fn detect(&self, image: &[u8], mime_type: &str) -> Result<RawDetections, DetectorError>;
}

/// Detector backed by an HTTP model-serving endpoint
pub struct HttpDetector {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpDetector {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DetectorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DetectorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Detector for HttpDetector {
    fn name(&self) -> &str {
        "http"
    }

    async fn detect(&self, image: &[u8], mime_type: &str) -> Result<RawDetections, DetectorError> {
        debug!(endpoint = %self.endpoint, size = image.len(), "Sending image to detector");

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| DetectorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectorError::Api(status.as_u16(), body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| DetectorError::Network(e.to_string()))?;

        parse_response(&text)
    }
}

/// Parse a model service response
///
/// Accepts either the object form or a bare array of predictions.
pub fn parse_response(body: &str) -> Result<RawDetections, DetectorError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| DetectorError::Parse(e.to_string()))?;

    if value.is_array() {
        let detections: Vec<RawDetection> =
            serde_json::from_value(value).map_err(|e| DetectorError::Parse(e.to_string()))?;
        return Ok(RawDetections {
            normalized: false,
            detections,
        });
    }

    serde_json::from_value(value).map_err(|e| DetectorError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_form() {
        let raw = parse_response(
            r#"{"normalized": true, "detections": [
                {"class": 2, "name": "aphid", "confidence": 0.8, "bbox": [0.1, 0.2, 0.3, 0.4]}
            ]}"#,
        )
        .unwrap();

        assert!(raw.normalized);
        assert_eq!(raw.detections.len(), 1);
        assert_eq!(raw.detections[0].class_id, 2);
        assert_eq!(raw.detections[0].label.as_deref(), Some("aphid"));
    }

    #[test]
    fn test_parse_bare_array_with_aliases() {
        let raw = parse_response(r#"[{"cls": 0, "score": 0.5, "xyxy": [1, 2, 3, 4]}]"#).unwrap();

        assert!(!raw.normalized);
        assert_eq!(raw.detections[0].label, None);
        assert_eq!(raw.detections[0].bbox, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_parse_empty_object() {
        assert!(parse_response("{}").unwrap().detections.is_empty());
    }

    #[test]
    fn test_parse_rejects_html() {
        assert!(matches!(
            parse_response("<html>Bad Gateway</html>"),
            Err(DetectorError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let detector =
            HttpDetector::new("http://127.0.0.1:9/predict", Duration::from_millis(500)).unwrap();
        assert!(matches!(
            detector.detect(b"bytes", "image/png").await,
            Err(DetectorError::Network(_))
        ));
    }
}

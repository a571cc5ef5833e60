//! Damage-report detection pipeline
//!
//! For each stored report photo:
//! 1. Resolve the public URL back to the local file
//! 2. Read and measure the image
//! 3. Send it to the [`Detector`]
//! 4. Post-process the raw predictions into [`Detection`]s
//!
//! A failing detector never fails the report itself; the outcome records
//! status `failed` with the error message instead.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::detector::{Detector, DetectorError, RawDetections};
use super::uploads::UploadStore;

/// Post-processing settings
#[derive(Debug, Clone)]
pub struct DetectionSettings {
    /// Predictions below this confidence are dropped
    pub confidence_threshold: f64,
    /// Upper bound on detections kept per image
    pub max_detections: usize,
    /// Class names indexed by class id
    pub labels: Vec<String>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            max_detections: 50,
            labels: Vec::new(),
        }
    }
}

impl DetectionSettings {
    /// Name for a class id: configured label, else `class_<id>`
    pub fn label_for(&self, class_id: i64) -> String {
        usize::try_from(class_id)
            .ok()
            .and_then(|idx| self.labels.get(idx))
            .filter(|label| !label.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }
}

/// Axis-aligned box in source image pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub class_id: i64,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Detections for one stored photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Public URL of the photo
    pub file: String,
    pub width: u32,
    pub height: u32,
    pub detections: Vec<Detection>,
    /// At least one detection survived post-processing
    pub flagged: bool,
    /// Label of the most confident detection
    pub top_label: Option<String>,
}

impl DetectionResult {
    pub fn new(file: String, width: u32, height: u32, detections: Vec<Detection>) -> Self {
        let top_label = detections.first().map(|d| d.label.clone());
        Self {
            file,
            width,
            height,
            flagged: !detections.is_empty(),
            top_label,
            detections,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStatus {
    Skipped,
    Completed,
    Failed,
}

impl DetectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionStatus::Skipped => "skipped",
            DetectionStatus::Completed => "completed",
            DetectionStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "skipped" => Some(DetectionStatus::Skipped),
            "completed" => Some(DetectionStatus::Completed),
            "failed" => Some(DetectionStatus::Failed),
            _ => None,
        }
    }
}

/// Outcome of running detection over a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutcome {
    pub status: DetectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub results: Vec<DetectionResult>,
}

impl DetectionOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: DetectionStatus::Skipped,
            message: Some(reason.into()),
            results: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: DetectionStatus::Failed,
            message: Some(message.into()),
            results: Vec::new(),
        }
    }

    pub fn completed(results: Vec<DetectionResult>) -> Self {
        Self {
            status: DetectionStatus::Completed,
            message: None,
            results,
        }
    }
}

/// Turn raw predictions into pixel-space detections
///
/// Drops non-finite and below-threshold predictions, scales normalized
/// boxes, reorders swapped corners, clamps to the image, drops zero-area
/// boxes, fills in labels, sorts by confidence (highest first) and keeps at
/// most `max_detections`.
pub fn postprocess(
    raw: RawDetections,
    width: u32,
    height: u32,
    settings: &DetectionSettings,
) -> Vec<Detection> {
    let (w, h) = (f64::from(width), f64::from(height));
    let (scale_x, scale_y) = if raw.normalized { (w, h) } else { (1.0, 1.0) };

    let mut detections: Vec<Detection> = raw
        .detections
        .into_iter()
        .filter(|d| d.confidence.is_finite() && d.bbox.iter().all(|v| v.is_finite()))
        .filter(|d| d.confidence >= settings.confidence_threshold)
        .filter_map(|d| {
            let [ax, ay, bx, by] = d.bbox;
            let (ax, bx) = (ax * scale_x, bx * scale_x);
            let (ay, by) = (ay * scale_y, by * scale_y);

            let bbox = BoundingBox {
                x1: ax.min(bx).clamp(0.0, w),
                y1: ay.min(by).clamp(0.0, h),
                x2: ax.max(bx).clamp(0.0, w),
                y2: ay.max(by).clamp(0.0, h),
            };
            if bbox.area() <= 0.0 {
                return None;
            }

            let label = d
                .label
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| settings.label_for(d.class_id));

            Some(Detection {
                label,
                class_id: d.class_id,
                confidence: d.confidence.min(1.0),
                bbox,
            })
        })
        .collect();

    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    detections.truncate(settings.max_detections);
    detections
}

/// Runs the detector over stored report photos
pub struct DetectionPipeline {
    detector: Arc<dyn Detector>,
    settings: DetectionSettings,
    uploads: Arc<UploadStore>,
}

impl DetectionPipeline {
    pub fn new(
        detector: Arc<dyn Detector>,
        settings: DetectionSettings,
        uploads: Arc<UploadStore>,
    ) -> Self {
        Self {
            detector,
            settings,
            uploads,
        }
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    /// Detect over every referenced photo
    ///
    /// The first failing photo turns the whole outcome into `failed`.
    pub async fn run(&self, files: &[String]) -> DetectionOutcome {
        let mut results = Vec::with_capacity(files.len());

        for file in files {
            match self.detect_file(file).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(
                        detector = self.detector.name(),
                        file = %file,
                        error = %e,
                        "Detection failed"
                    );
                    return DetectionOutcome::failed(e.to_string());
                }
            }
        }

        let flagged = results.iter().filter(|r| r.flagged).count();
        info!(
            detector = self.detector.name(),
            files = results.len(),
            flagged,
            "Detection completed"
        );

        DetectionOutcome::completed(results)
    }

    async fn detect_file(&self, file: &str) -> Result<DetectionResult, DetectorError> {
        let path = self
            .uploads
            .resolve_local_path(file)
            .map_err(|e| DetectorError::Input(e.to_string()))?;

        let bytes = tokio::fs::read(&path).await?;
        let info = self
            .uploads
            .validate_image(file, &bytes)
            .map_err(|e| DetectorError::Input(e.to_string()))?;

        let raw = self.detector.detect(&bytes, info.mime_type).await?;
        let raw_count = raw.detections.len();
        let detections = postprocess(raw, info.width, info.height, &self.settings);

        debug!(
            file = %file,
            raw = raw_count,
            kept = detections.len(),
            "Post-processed detections"
        );

        Ok(DetectionResult::new(
            file.to_string(),
            info.width,
            info.height,
            detections,
        ))
    }
}

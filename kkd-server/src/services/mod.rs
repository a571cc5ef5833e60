//! Services used by the HTTP handlers
//!
//! Each service owns its error type; handlers convert them into
//! [`crate::ApiError`].

pub mod detection;
pub mod detector;
pub mod passwords;
pub mod seminars;
pub mod tokens;
pub mod uploads;

pub use detection::{
    BoundingBox, Detection, DetectionOutcome, DetectionPipeline, DetectionResult,
    DetectionSettings, DetectionStatus,
};
pub use detector::{Detector, DetectorError, HttpDetector, RawDetection, RawDetections};
pub use seminars::{Seminar, SeminarService, ScraperError};
pub use tokens::{Claims, TokenError, TokenIssuer};
pub use uploads::{ImageInfo, StoredFile, UploadError, UploadKind, UploadStore};

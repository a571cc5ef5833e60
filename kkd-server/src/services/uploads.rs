//! Image uploads
//!
//! Validates uploaded images, persists them under `<root>/static/<kind>/` and
//! maps between the public URL (`/static/reports/<name>`) and the local path.
//!
//! Validation order:
//! 1. Non-empty and within the size limit
//! 2. Magic bytes identify an accepted image type (the client-supplied
//!    content type and extension are ignored)
//! 3. The image header decodes to non-zero dimensions

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::error::ApiError;

/// Accepted MIME types, detected from content
pub const ACCEPTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/bmp"];

/// URL prefix under which the static directory is served
pub const STATIC_URL_PREFIX: &str = "/static/";

/// Upload errors
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File {0} is empty")]
    Empty(String),

    #[error("File {name} is {size} bytes, limit is {limit}")]
    TooLarge { name: String, size: usize, limit: usize },

    #[error("At most {limit} files may be uploaded at once")]
    TooManyFiles { limit: usize },

    #[error("File {name} is not an accepted image ({detected})")]
    UnsupportedType { name: String, detected: String },

    #[error("File {name} could not be decoded as an image: {reason}")]
    Undecodable { name: String, reason: String },

    #[error("Invalid file reference: {0}")]
    InvalidReference(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            UploadError::UnsupportedType { .. } => ApiError::UnsupportedMediaType(err.to_string()),
            UploadError::Io(e) => ApiError::Io(e),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

/// Upload destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Report,
    ProfileImage,
}

impl UploadKind {
    /// Subdirectory under the static root
    pub fn dir_name(self) -> &'static str {
        match self {
            UploadKind::Report => "reports",
            UploadKind::ProfileImage => "profile_images",
        }
    }
}

/// Result of image validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// A persisted upload
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    /// Public URL, e.g. `/static/reports/1714550000000000_leaf.jpg`
    pub url: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: usize,
}

/// Stores uploads under the static root
#[derive(Debug, Clone)]
pub struct UploadStore {
    static_root: PathBuf,
    max_file_bytes: usize,
    max_files: usize,
    public_base_url: Option<Url>,
}

impl UploadStore {
    pub fn new(static_root: PathBuf, max_file_bytes: usize, max_files: usize) -> Self {
        Self {
            static_root,
            max_file_bytes,
            max_files,
            public_base_url: None,
        }
    }

    /// Origin under which `/static` is publicly reachable
    pub fn with_public_base_url(mut self, base: Url) -> Self {
        self.public_base_url = Some(base);
        self
    }

    pub fn static_root(&self) -> &Path {
        &self.static_root
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Enforce the per-request file count limit
    pub fn check_file_count(&self, count: usize) -> Result<(), UploadError> {
        if count > self.max_files {
            return Err(UploadError::TooManyFiles {
                limit: self.max_files,
            });
        }
        Ok(())
    }

    /// Validate an uploaded image
    pub fn validate_image(&self, name: &str, bytes: &[u8]) -> Result<ImageInfo, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty(name.to_string()));
        }

        if bytes.len() > self.max_file_bytes {
            return Err(UploadError::TooLarge {
                name: name.to_string(),
                size: bytes.len(),
                limit: self.max_file_bytes,
            });
        }

        let detected = infer::get(bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("unknown");
        let mime_type = ACCEPTED_IMAGE_TYPES
            .iter()
            .copied()
            .find(|accepted| *accepted == detected)
            .ok_or_else(|| UploadError::UnsupportedType {
                name: name.to_string(),
                detected: detected.to_string(),
            })?;

        let (width, height) = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| UploadError::Undecodable {
                name: name.to_string(),
                reason: e.to_string(),
            })?
            .into_dimensions()
            .map_err(|e| UploadError::Undecodable {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        if width == 0 || height == 0 {
            return Err(UploadError::Undecodable {
                name: name.to_string(),
                reason: "zero-sized image".to_string(),
            });
        }

        Ok(ImageInfo {
            mime_type,
            width,
            height,
        })
    }

    /// Write a validated image and return its public URL and local path
    pub async fn save(
        &self,
        kind: UploadKind,
        stored_name: &str,
        bytes: &[u8],
        info: &ImageInfo,
    ) -> Result<StoredFile, UploadError> {
        let dir = self.static_root.join(kind.dir_name());
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(stored_name);
        tokio::fs::write(&path, bytes).await?;

        debug!(path = %path.display(), size = bytes.len(), "Stored upload");

        Ok(StoredFile {
            url: format!("{}{}/{}", STATIC_URL_PREFIX, kind.dir_name(), stored_name),
            path,
            mime_type: info.mime_type.to_string(),
            width: info.width,
            height: info.height,
            size_bytes: bytes.len(),
        })
    }

    /// Delete files written earlier in a request that did not complete
    ///
    /// Failures are logged; a file that is already gone is not an error.
    pub async fn discard(&self, files: &[StoredFile]) {
        for file in files {
            match tokio::fs::remove_file(&file.path).await {
                Ok(()) => debug!(path = %file.path.display(), "Discarded upload"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %file.path.display(),
                    error = %e,
                    "Failed to discard upload"
                ),
            }
        }
    }

    /// Delete a replaced upload of `kind`, given its public URL
    ///
    /// References outside the kind's directory (external URLs, other kinds)
    /// are left alone. Returns whether a file was removed.
    pub async fn remove_replaced(&self, kind: UploadKind, url: &str) -> bool {
        let Ok(path) = self.resolve_local_path(url) else {
            return false;
        };
        if path.parent() != Some(self.static_root.join(kind.dir_name()).as_path()) {
            return false;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed replaced upload");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove replaced upload");
                false
            }
        }
    }

    /// Map a file reference back to its local path
    ///
    /// Accepts a `/static/...` URL, an absolute URL on the public base URL,
    /// or a bare file name (taken to be a report photo). Anything that would
    /// escape the static root is rejected.
    pub fn resolve_local_path(&self, reference: &str) -> Result<PathBuf, UploadError> {
        let reference = reference.trim();
        let invalid = || UploadError::InvalidReference(reference.to_string());

        let url_path;
        let path_part = if reference.starts_with("http://") || reference.starts_with("https://") {
            let url = Url::parse(reference).map_err(|_| invalid())?;
            let base = self.public_base_url.as_ref().ok_or_else(invalid)?;
            if url.origin() != base.origin() {
                return Err(invalid());
            }
            url_path = url.path().to_string();
            url_path.as_str()
        } else {
            reference
        };

        let relative = if let Some(rest) = path_part.strip_prefix(STATIC_URL_PREFIX) {
            PathBuf::from(rest)
        } else if !path_part.is_empty() && !path_part.contains(['/', '\\']) {
            Path::new(UploadKind::Report.dir_name()).join(path_part)
        } else {
            return Err(invalid());
        };

        if relative.as_os_str().is_empty()
            || path_part.contains('\\')
            || !relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(invalid());
        }

        Ok(self.static_root.join(relative))
    }
}

/// Reduce a client-supplied file name to a safe ASCII name
///
/// Keeps only the final path component; characters outside
/// `[A-Za-z0-9._-]` become `_`; leading dots are stripped.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.chars().take(100).collect()
    }
}

/// Stored name for a report photo: `<unix micros>_<sanitized name>`
pub fn report_file_name(original: &str, received_at: &DateTime<Utc>) -> String {
    format!(
        "{}_{}",
        received_at.timestamp_micros(),
        sanitize_file_name(original)
    )
}

/// Stored name for a profile image: `<user id>_<sanitized name>`
pub fn profile_file_name(user_id: &uuid::Uuid, original: &str) -> String {
    format!("{}_{}", user_id, sanitize_file_name(original))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Encode a small solid PNG
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([40, 160, 60]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn store(root: &Path) -> UploadStore {
        UploadStore::new(root.to_path_buf(), 1024 * 1024, 3)
    }

    #[test]
    fn test_validate_png() {
        let dir = tempfile::tempdir().unwrap();
        let info = store(dir.path()).validate_image("leaf.png", &png_bytes(8, 5)).unwrap();
        assert_eq!(info.mime_type, "image/png");
        assert_eq!((info.width, info.height), (8, 5));
    }

    #[test]
    fn test_validate_other_accepted_formats() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let img = image::RgbImage::from_pixel(7, 3, image::Rgb([200, 180, 20]));

        for (format, mime) in [
            (image::ImageFormat::Jpeg, "image/jpeg"),
            (image::ImageFormat::Bmp, "image/bmp"),
            (image::ImageFormat::WebP, "image/webp"),
        ] {
            let mut out = Cursor::new(Vec::new());
            img.write_to(&mut out, format).unwrap();

            let info = store
                .validate_image("photo", out.get_ref())
                .unwrap_or_else(|e| panic!("{:?} rejected: {}", format, e));
            assert_eq!(info.mime_type, mime, "{:?}", format);
            assert_eq!((info.width, info.height), (7, 3), "{:?}", format);
            assert!(ACCEPTED_IMAGE_TYPES.contains(&info.mime_type));
        }
    }

    #[test]
    fn test_rejects_empty_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(matches!(store.validate_image("a.png", b""), Err(UploadError::Empty(_))));
        assert!(matches!(
            store.validate_image("a.png", b"hello, not an image"),
            Err(UploadError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_rejects_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_path_buf(), 16, 3);
        assert!(matches!(
            store.validate_image("big.png", &png_bytes(8, 8)),
            Err(UploadError::TooLarge { limit: 16, .. })
        ));
    }

    #[test]
    fn test_rejects_truncated_image() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = png_bytes(8, 8);
        // PNG signature survives, IHDR does not
        let truncated = &bytes[..12];
        assert!(matches!(
            store(dir.path()).validate_image("cut.png", truncated),
            Err(UploadError::Undecodable { .. })
        ));
    }

    #[test]
    fn test_file_count_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(store.check_file_count(3).is_ok());
        assert!(matches!(
            store.check_file_count(4),
            Err(UploadError::TooManyFiles { limit: 3 })
        ));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("leaf.jpg"), "leaf.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\photos\\my leaf.png"), "my_leaf.png");
        assert_eq!(sanitize_file_name("병해충.jpg"), "___.jpg");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name("dir/"), "upload");
    }

    #[test]
    fn test_report_file_name_prefix() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(report_file_name("a b.png", &ts), "1714521600000000_a_b.png");
    }

    #[tokio::test]
    async fn test_save_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let bytes = png_bytes(4, 4);
        let info = store.validate_image("x.png", &bytes).unwrap();

        let stored = store
            .save(UploadKind::Report, "123_x.png", &bytes, &info)
            .await
            .unwrap();

        assert_eq!(stored.url, "/static/reports/123_x.png");
        assert_eq!(std::fs::read(&stored.path).unwrap(), bytes);
        assert_eq!(store.resolve_local_path(&stored.url).unwrap(), stored.path);
        assert_eq!(store.resolve_local_path("123_x.png").unwrap(), stored.path);
    }

    #[tokio::test]
    async fn test_discard_removes_written_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let bytes = png_bytes(4, 4);
        let info = store.validate_image("x.png", &bytes).unwrap();

        let first = store.save(UploadKind::Report, "1_a.png", &bytes, &info).await.unwrap();
        let second = store.save(UploadKind::Report, "2_b.png", &bytes, &info).await.unwrap();
        std::fs::remove_file(&second.path).unwrap();

        store.discard(&[first.clone(), second]).await;
        assert!(!first.path.exists());
    }

    #[tokio::test]
    async fn test_remove_replaced_stays_in_kind_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let bytes = png_bytes(4, 4);
        let info = store.validate_image("x.png", &bytes).unwrap();

        let profile = store
            .save(UploadKind::ProfileImage, "u_old.png", &bytes, &info)
            .await
            .unwrap();
        let report = store.save(UploadKind::Report, "1_a.png", &bytes, &info).await.unwrap();

        assert!(!store.remove_replaced(UploadKind::ProfileImage, &report.url).await);
        assert!(report.path.exists());
        assert!(!store.remove_replaced(UploadKind::ProfileImage, "https://cdn.example.org/a.png").await);

        assert!(store.remove_replaced(UploadKind::ProfileImage, &profile.url).await);
        assert!(!profile.path.exists());
        assert!(!store.remove_replaced(UploadKind::ProfileImage, &profile.url).await);
    }

    #[test]
    fn test_resolve_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path())
            .with_public_base_url(Url::parse("https://api.example.org").unwrap());

        assert_eq!(
            store
                .resolve_local_path("https://api.example.org/static/reports/1_a.png")
                .unwrap(),
            dir.path().join("reports").join("1_a.png")
        );
        assert!(store
            .resolve_local_path("https://evil.example.com/static/reports/1_a.png")
            .is_err());
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        for reference in [
            "/static/../kkodurami.db",
            "/static/reports/../../secret",
            "/etc/passwd",
            "reports/1_a.png",
            "..",
            "",
            "/static/",
            "https://api.example.org/static/reports/1_a.png",
        ] {
            assert!(
                store.resolve_local_path(reference).is_err(),
                "accepted {:?}",
                reference
            );
        }
    }
}

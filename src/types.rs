use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A request to run the upload pipeline for one source image.
///
/// Immutable once submitted; the pipeline never writes back into it.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Local path of the source image
    pub source: PathBuf,
    /// Fixed destination path; set to skip allocation and its collision check
    pub destination: Option<String>,
    /// Overrides the configured key prefix for this request only
    pub path_prefix: Option<String>,
}

impl UploadRequest {
    pub fn new<P: Into<PathBuf>>(source: P) -> Self {
        Self {
            source: source.into(),
            destination: None,
            path_prefix: None,
        }
    }

    /// Use a caller-supplied destination path instead of allocating one
    pub fn with_destination<S: Into<String>>(mut self, destination: S) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Override the configured key prefix
    pub fn with_path_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }
}

/// Declarative template for one rendered variant of the source image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionSpec {
    /// Maximum output width; the scaler preserves aspect ratio within bounds
    pub max_width: Option<u32>,
    /// Maximum output height
    pub max_height: Option<u32>,
    /// Output format (file extension, e.g. "jpg", "png"); source format if unset
    pub format: Option<String>,
    /// Appended to the shared destination path, before the extension
    pub suffix: Option<String>,
    /// Encode quality 1-100; the configured default applies if unset
    pub quality: Option<u8>,
    /// Per-version ACL override
    pub acl: Option<String>,
    /// Expires header offset from upload time
    pub expires: Option<Duration>,
    /// Cache-Control max-age in seconds
    pub max_age: Option<u64>,
    /// Pass the source file through unmodified instead of resizing
    pub is_original: bool,
}

impl VersionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pass-through spec for the unmodified source file
    pub fn original() -> Self {
        Self {
            is_original: true,
            ..Self::default()
        }
    }

    pub fn with_max_width(mut self, width: u32) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn with_max_height(mut self, height: u32) -> Self {
        self.max_height = Some(height);
        self
    }

    pub fn with_format<S: Into<String>>(mut self, format: S) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_acl<S: Into<String>>(mut self, acl: S) -> Self {
        self.acl = Some(acl.into());
        self
    }

    pub fn with_expires(mut self, expires: Duration) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }
}

/// Source image properties, extracted once per request and shared read-only
/// by every version resize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    /// Normalized format name / primary file extension, e.g. "jpg"
    pub format: String,
    pub size_bytes: u64,
    /// e.g. "RGB", "RGBA", "Gray"
    pub colorspace: String,
    /// EXIF tag name to rendered value, present when requested
    pub exif: Option<BTreeMap<String, String>>,
}

/// One rendered variant on local disk, waiting to be uploaded.
#[derive(Debug, Clone)]
pub struct ResizedArtifact {
    pub local_path: PathBuf,
    /// The spec this artifact was derived from (the run's own copy)
    pub spec: VersionSpec,
    /// Achieved output width
    pub width: u32,
    /// Achieved output height
    pub height: u32,
    pub mime_type: String,
}

/// The terminal, externally visible record for one uploaded version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedVersion {
    /// Object key in the remote store
    pub key: String,
    /// Content identifier returned by the store
    pub etag: String,
    /// Composed public URL, when a URL base is configured
    pub url: Option<String>,
    pub is_original: bool,
    /// Local path of the uploaded file, consumed by cleanup
    pub local_path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Storage key prefix shared by all versions of one upload request.
///
/// Guaranteed, best-effort at allocation time, to have no existing object
/// under it as a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationPath(pub String);

impl DestinationPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DestinationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowercased file extension, used for key and content-type derivation.
pub(crate) fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// MIME type for an image file extension. `jpg` maps to the `jpeg` subtype;
/// every other extension maps to `image/<ext>` verbatim.
pub(crate) fn mime_for_extension(ext: &str) -> String {
    match ext {
        "jpg" => "image/jpeg".to_string(),
        other => format!("image/{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_spec_builder_sets_fields() {
        let spec = VersionSpec::new()
            .with_max_width(320)
            .with_suffix("-small")
            .with_quality(80);

        assert_eq!(spec.max_width, Some(320));
        assert_eq!(spec.max_height, None);
        assert_eq!(spec.suffix.as_deref(), Some("-small"));
        assert_eq!(spec.quality, Some(80));
        assert!(!spec.is_original);
    }

    #[test]
    fn original_spec_is_flagged() {
        assert!(VersionSpec::original().is_original);
    }

    #[test]
    fn mime_special_cases_jpg() {
        assert_eq!(mime_for_extension("jpg"), "image/jpeg");
        assert_eq!(mime_for_extension("jpeg"), "image/jpeg");
        assert_eq!(mime_for_extension("png"), "image/png");
        assert_eq!(mime_for_extension("webp"), "image/webp");
    }

    #[test]
    fn file_extension_is_lowercased() {
        assert_eq!(
            file_extension(Path::new("/tmp/photo.JPG")).as_deref(),
            Some("jpg")
        );
        assert_eq!(file_extension(Path::new("/tmp/noext")), None);
    }
}

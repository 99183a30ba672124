use crate::types::VersionSpec;

/// Configuration for the upload pipeline.
///
/// Constructed once and passed by reference; never mutated after
/// construction, so concurrent requests cannot couple through it.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Key prefix prepended to every allocated destination path
    pub path_prefix: String,

    /// ACL applied to versions without a per-version override
    pub default_acl: String,

    /// Encode quality applied to versions without a per-version override
    pub default_quality: u8,

    /// Base prepended to object keys to form public URLs; no URLs if unset
    pub url_base: Option<String>,

    /// Which local files survive a successful upload
    pub retention: RetentionPolicy,

    /// Attempt budget for the destination path allocator
    pub max_path_attempts: u32,

    /// Ask the probe for the EXIF block
    pub want_exif: bool,

    /// Report orientation-corrected dimensions
    pub auto_orient: bool,

    /// Upload the unmodified source as an extra version, with these
    /// per-version overrides applied
    pub original: Option<VersionSpec>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path_prefix: String::new(),
            default_acl: "private".to_string(),
            default_quality: 70,
            url_base: None,
            retention: RetentionPolicy::default(),
            max_path_attempts: 5,
            want_exif: false,
            auto_orient: true,
            original: None,
        }
    }
}

impl UploadConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the destination key prefix
    pub fn with_path_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    /// Set the default ACL
    pub fn with_default_acl<S: Into<String>>(mut self, acl: S) -> Self {
        self.default_acl = acl.into();
        self
    }

    /// Set the default encode quality (1-100)
    pub fn with_default_quality(mut self, quality: u8) -> Self {
        self.default_quality = quality;
        self
    }

    /// Compose public URLs as `url_base + key`
    pub fn with_url_base<S: Into<String>>(mut self, base: S) -> Self {
        self.url_base = Some(base.into());
        self
    }

    /// Set the retention policy
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Set the path allocation attempt budget
    pub fn with_max_path_attempts(mut self, attempts: u32) -> Self {
        self.max_path_attempts = attempts;
        self
    }

    /// Include the EXIF block in extracted metadata
    pub fn with_exif(mut self) -> Self {
        self.want_exif = true;
        self
    }

    /// Upload the unmodified source as an extra version
    pub fn with_original(mut self, overrides: VersionSpec) -> Self {
        self.original = Some(overrides);
        self
    }
}

/// Which local temporary files are kept after a successful upload.
///
/// Everything not retained is deleted by the cleanup stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionPolicy {
    /// Keep the local source file
    pub retain_original: bool,
    /// Keep the locally rendered derived versions
    pub retain_versions: bool,
}

impl RetentionPolicy {
    pub fn new(retain_original: bool, retain_versions: bool) -> Self {
        Self {
            retain_original,
            retain_versions,
        }
    }

    /// Delete nothing
    pub fn retain_all() -> Self {
        Self::new(true, true)
    }

    /// Whether a version with the given original flag should be kept locally
    pub fn retains(&self, is_original: bool) -> bool {
        if is_original {
            self.retain_original
        } else {
            self.retain_versions
        }
    }
}

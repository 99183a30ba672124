use std::path::PathBuf;

use thiserror::Error;

use crate::graph::Stage;
use crate::types::ImageMetadata;

/// Result type for pipeline operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors that can occur during an upload pipeline run
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("no free destination path after {attempts} attempts (last candidate: {last_candidate})")]
    PathExhausted { attempts: u32, last_candidate: String },

    #[error("failed to read image metadata: {source}")]
    Metadata {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("resize failed for version {}: {source}", .suffix.as_deref().unwrap_or("<no suffix>"))]
    Resize {
        suffix: Option<String>,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("upload failed for key {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("uploaded {actual} versions for {expected} artifacts")]
    VersionCountMismatch { expected: usize, actual: usize },

    #[error("internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create a metadata error from any error type
    pub fn metadata<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Metadata {
            source: Box::new(error),
        }
    }

    /// Create a resize error for the version with the given suffix
    pub fn resize<E>(suffix: Option<&str>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Resize {
            suffix: suffix.map(str::to_string),
            source: Box::new(error),
        }
    }

    /// Create an upload error for the given object key
    pub fn upload<S: Into<String>, E>(key: S, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Upload {
            key: key.into(),
            source: Box::new(error),
        }
    }
}

/// A pipeline run that stopped at a named stage.
///
/// Carries whatever partial results were produced before the failure; today
/// that is the source metadata when the failing stage ran after `metadata`.
#[derive(Debug)]
pub struct PipelineFailure {
    /// The stage that produced the error
    pub stage: Stage,
    /// The underlying error
    pub error: UploadError,
    /// Metadata extracted before the failure, if any
    pub metadata: Option<ImageMetadata>,
}

impl PipelineFailure {
    pub(crate) fn at(stage: Stage, error: UploadError) -> Self {
        Self {
            stage,
            error,
            metadata: None,
        }
    }

    pub(crate) fn with_metadata(mut self, metadata: ImageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl std::fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pipeline failed at {} stage: {}", self.stage, self.error)
    }
}

impl std::error::Error for PipelineFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A single local delete that failed during cleanup.
///
/// Cleanup failures are reported on the successful pipeline result; they
/// never change the run's outcome.
#[derive(Debug)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: std::io::Error,
}

impl std::fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to remove {}: {}", self.path.display(), self.error)
    }
}

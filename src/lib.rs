//! # pixlift: image variant upload pipeline
//!
//! `pixlift` takes a single source image, renders a configurable set of
//! resized variants (plus, optionally, the untouched original), uploads each
//! one to object storage under a collision-free destination path, and cleans
//! up the local temporaries afterward.
//!
//! ## Key behaviors
//!
//! - **Dependency-ordered stages**: metadata extraction and destination-path
//!   allocation run concurrently; resize waits on metadata; upload waits on
//!   resize and destination; cleanup waits on upload. The graph is declared
//!   in [`graph::Stage`], not implied by call order.
//! - **Collision-free paths**: the allocator draws random candidates and
//!   confirms them against the store's prefix listing, retrying up to a
//!   configured budget.
//! - **Fail-fast fan-out**: one failed resize or upload fails the whole run
//!   with the first error and its stage; no partial version list is returned.
//! - **Selective retention**: after upload, local files are deleted per the
//!   configured [`RetentionPolicy`]; cleanup failures are reported but never
//!   fatal.
//!
//! ## Quick start
//!
//! ```no_run
//! use pixlift::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = pixlift::S3ObjectStore::from_env("my-bucket").await;
//! let config = UploadConfig::new()
//!     .with_path_prefix("media/")
//!     .with_url_base("https://cdn.example.com/")
//!     .with_original(VersionSpec::new().with_acl("private"));
//!
//! let uploader = ImageUploader::new(store, config);
//!
//! let specs = vec![
//!     VersionSpec::new()
//!         .with_max_width(1040)
//!         .with_max_height(1040)
//!         .with_suffix("-large")
//!         .with_quality(80),
//!     VersionSpec::new().with_max_width(320).with_suffix("-small"),
//! ];
//!
//! let report = uploader
//!     .run(UploadRequest::new("/tmp/photo.jpg"), &specs)
//!     .await?;
//!
//! for version in &report.versions {
//!     println!("{} -> {:?}", version.key, version.url);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  ImageUploader   │  ← stage orchestration
//! ├──────────────────┤
//! │ ObjectStore      │  ← storage primitives (S3, memory, custom)
//! │ ImageProbe/Scaler│  ← imaging primitives (built-in or custom)
//! └──────────────────┘
//! ```
//!
//! Every collaborator sits behind a trait, so tests (and embedders without
//! remote storage) can swap in [`MemoryStore`] or stub imaging backends.

mod allocator;
mod config;
mod error;
pub mod graph;
mod imaging;
mod pipeline;
mod reconcile;
mod s3_store;
pub mod store;
mod types;
mod uploader;
mod versions;

// Re-export main types for clean API
pub use allocator::PathAllocator;
pub use config::{RetentionPolicy, UploadConfig};
pub use error::{CleanupFailure, PipelineFailure, UploadError, UploadResult};
pub use graph::Stage;
pub use imaging::{
    ImageProbe, ImageScaler, ImagingBackend, ProbeOptions, RenderedImage, ResizeTarget,
};
pub use pipeline::{ImageUploader, PipelineReport};
pub use s3_store::S3ObjectStore;
pub use store::{MemoryStore, ObjectStore, PutOptions, PutReceipt, StoredObject};
pub use types::{
    DestinationPath, ImageMetadata, ResizedArtifact, UploadRequest, UploadedVersion, VersionSpec,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ImageUploader, ObjectStore, PipelineFailure, PipelineReport, RetentionPolicy,
        UploadConfig, UploadError, UploadRequest, UploadResult, UploadedVersion, VersionSpec,
    };
}

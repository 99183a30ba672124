//! The pipeline orchestrator.
//!
//! [`ImageUploader`] wires the stages of [`crate::graph`] together:
//! `destination` runs as its own task, concurrent with `metadata` and
//! `resize`; `upload` starts only once both of its dependencies have
//! succeeded; `cleanup` follows `upload`. A stage failure stops the pipeline
//! with the first error, labeled with its stage: stages that have not
//! started yet never start, and when a non-destination stage fails first the
//! in-flight destination task is left to finish detached with its result
//! discarded.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::allocator::PathAllocator;
use crate::config::UploadConfig;
use crate::error::{CleanupFailure, PipelineFailure, UploadError, UploadResult};
use crate::graph::Stage;
use crate::imaging::{ImageProbe, ImageScaler, ImagingBackend, ProbeOptions};
use crate::reconcile::reconcile;
use crate::store::ObjectStore;
use crate::types::{DestinationPath, ImageMetadata, UploadRequest, UploadedVersion, VersionSpec};
use crate::uploader::upload_versions;
use crate::versions::resize_versions;

/// Collapse a destination task's join result into the stage result, turning
/// a panic or cancellation into an internal error.
fn flatten_destination(
    joined: Result<UploadResult<DestinationPath>, tokio::task::JoinError>,
) -> UploadResult<DestinationPath> {
    match joined {
        Ok(result) => result,
        Err(join_error) => Err(UploadError::Internal(format!(
            "destination task failed: {join_error}"
        ))),
    }
}

/// Everything a successful pipeline run produced.
#[derive(Debug)]
pub struct PipelineReport {
    /// One record per uploaded version, in spec order (configured original last)
    pub versions: Vec<UploadedVersion>,
    /// Source metadata extracted by the probe
    pub metadata: ImageMetadata,
    /// The destination path shared by all versions
    pub destination: DestinationPath,
    /// Local deletes that failed; never fatal
    pub cleanup_failures: Vec<CleanupFailure>,
}

/// The pipeline entry point. Owns the storage, probe and scaler
/// collaborators plus an immutable configuration, and runs the full upload
/// pipeline per request.
pub struct ImageUploader {
    store: Arc<dyn ObjectStore>,
    probe: Arc<dyn ImageProbe>,
    scaler: Arc<dyn ImageScaler>,
    config: UploadConfig,
}

impl ImageUploader {
    /// Create an uploader over the given store, with the built-in imaging
    /// backend for metadata and resizing.
    pub fn new<S: ObjectStore + 'static>(store: S, config: UploadConfig) -> Self {
        let backend = ImagingBackend::new();
        Self {
            store: Arc::new(store),
            probe: Arc::new(backend),
            scaler: Arc::new(backend),
            config,
        }
    }

    /// Replace the metadata and resize collaborators.
    pub fn with_imaging<P, R>(mut self, probe: P, scaler: R) -> Self
    where
        P: ImageProbe + 'static,
        R: ImageScaler + 'static,
    {
        self.probe = Arc::new(probe);
        self.scaler = Arc::new(scaler);
        self
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Run the pipeline for one request.
    ///
    /// The caller's spec list is never mutated; the run operates on its own
    /// copy. On failure the caller gets the first error with its stage and
    /// whatever partial results (metadata) were produced before it; no
    /// partial version list is ever returned.
    #[instrument(skip_all, fields(source = %request.source.display()))]
    pub async fn run(
        &self,
        request: UploadRequest,
        specs: &[VersionSpec],
    ) -> Result<PipelineReport, PipelineFailure> {
        // destination has no dependency on metadata: it runs as its own task
        // and, if an earlier stage fails, keeps running detached with its
        // result discarded.
        let mut destination_task = {
            let store = self.store.clone();
            let attempts = self.config.max_path_attempts;
            let fixed = request.destination.clone();
            let prefix = request
                .path_prefix
                .clone()
                .unwrap_or_else(|| self.config.path_prefix.clone());
            tokio::spawn(async move {
                match fixed {
                    Some(path) => Ok(DestinationPath(path)),
                    None => PathAllocator::new(store, attempts).allocate(&prefix).await,
                }
            })
        };

        let probe_opts = ProbeOptions {
            want_exif: self.config.want_exif,
            auto_orient: self.config.auto_orient,
        };
        let metadata = self
            .probe
            .read(&request.source, probe_opts)
            .await
            .map_err(|e| PipelineFailure::at(Stage::Metadata, e))?;
        debug!(
            width = metadata.width,
            height = metadata.height,
            format = %metadata.format,
            "metadata extracted"
        );

        // Resize is raced against the destination task so a destination
        // failure is observed the moment it lands: if allocation has already
        // failed when resize becomes eligible, resize never starts, and if
        // it fails mid-resize the destination error wins as the first one.
        let run_specs: Vec<VersionSpec> = specs.to_vec();
        let mut destination: Option<DestinationPath> = None;
        let artifacts = {
            let resize = resize_versions(
                self.scaler.clone(),
                &request.source,
                &metadata,
                run_specs,
                &self.config,
            );
            tokio::pin!(resize);

            loop {
                tokio::select! {
                    biased;
                    joined = &mut destination_task, if destination.is_none() => {
                        match flatten_destination(joined) {
                            Ok(path) => destination = Some(path),
                            Err(e) => {
                                return Err(PipelineFailure::at(Stage::Destination, e)
                                    .with_metadata(metadata.clone()));
                            }
                        }
                    }
                    resized = &mut resize => {
                        break resized.map_err(|e| {
                            PipelineFailure::at(Stage::Resize, e).with_metadata(metadata.clone())
                        })?;
                    }
                }
            }
        };

        let destination = match destination {
            Some(path) => path,
            // resize finished before allocation did; wait for it now
            None => flatten_destination(destination_task.await).map_err(|e| {
                PipelineFailure::at(Stage::Destination, e).with_metadata(metadata.clone())
            })?,
        };

        let expected = artifacts.len() + usize::from(self.config.original.is_some());
        let versions = upload_versions(
            self.store.clone(),
            &self.config,
            &destination,
            artifacts,
            &request.source,
            &metadata,
        )
        .await
        .map_err(|e| PipelineFailure::at(Stage::Upload, e).with_metadata(metadata.clone()))?;

        if versions.len() != expected {
            let error = UploadError::VersionCountMismatch {
                expected,
                actual: versions.len(),
            };
            return Err(PipelineFailure::at(Stage::Upload, error).with_metadata(metadata.clone()));
        }

        let cleanup_failures = reconcile(&versions, self.config.retention).await;

        info!(
            versions = versions.len(),
            destination = %destination,
            cleanup_failures = cleanup_failures.len(),
            "pipeline complete"
        );

        Ok(PipelineReport {
            versions,
            metadata,
            destination,
            cleanup_failures,
        })
    }
}

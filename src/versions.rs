//! The resize fan-out stage.
//!
//! Every version spec is rendered concurrently from the shared source
//! metadata; the first failure aborts the batch (fail-fast, no partial
//! success). Results are assembled in spec order regardless of completion
//! order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use crate::config::UploadConfig;
use crate::error::{UploadError, UploadResult};
use crate::imaging::{ImageScaler, ResizeTarget};
use crate::types::{file_extension, mime_for_extension, ImageMetadata, ResizedArtifact, VersionSpec};

pub(crate) async fn resize_versions(
    scaler: Arc<dyn ImageScaler>,
    source: &Path,
    metadata: &ImageMetadata,
    specs: Vec<VersionSpec>,
    config: &UploadConfig,
) -> UploadResult<Vec<ResizedArtifact>> {
    let tasks = specs.into_iter().map(|spec| {
        let scaler = scaler.clone();
        async move {
            if spec.is_original {
                Ok(pass_through(source, metadata, spec))
            } else {
                resize_one(scaler, source, &spec, config.default_quality).await
            }
        }
    });

    let artifacts = try_join_all(tasks).await?;
    debug!(count = artifacts.len(), "resize fan-out complete");
    Ok(artifacts)
}

/// The unmodified source file, treated as an artifact.
pub(crate) fn pass_through(
    source: &Path,
    metadata: &ImageMetadata,
    spec: VersionSpec,
) -> ResizedArtifact {
    let ext = file_extension(source).unwrap_or_else(|| metadata.format.clone());
    ResizedArtifact {
        local_path: source.to_path_buf(),
        width: metadata.width,
        height: metadata.height,
        mime_type: mime_for_extension(&ext),
        spec,
    }
}

async fn resize_one(
    scaler: Arc<dyn ImageScaler>,
    source: &Path,
    spec: &VersionSpec,
    default_quality: u8,
) -> UploadResult<ResizedArtifact> {
    let ext = output_extension(source, spec);
    let output = output_path(source, spec, &ext);
    let target = ResizeTarget {
        max_width: spec.max_width,
        max_height: spec.max_height,
        quality: spec.quality.unwrap_or(default_quality),
        format: Some(ext.clone()),
    };

    let rendered = scaler
        .scale(source, &output, &target)
        .await
        .map_err(|e| label_resize(spec.suffix.as_deref(), e))?;

    Ok(ResizedArtifact {
        local_path: rendered.path,
        width: rendered.width,
        height: rendered.height,
        mime_type: mime_for_extension(&ext),
        spec: spec.clone(),
    })
}

/// Attach the version suffix to a resize error, unless one is already there.
fn label_resize(suffix: Option<&str>, err: UploadError) -> UploadError {
    match err {
        e @ UploadError::Resize { suffix: Some(_), .. } => e,
        UploadError::Resize { suffix: None, source } => UploadError::Resize {
            suffix: suffix.map(str::to_string),
            source,
        },
        other => UploadError::resize(suffix, other),
    }
}

/// Output format as an extension: the spec's format, else the source's.
fn output_extension(source: &Path, spec: &VersionSpec) -> String {
    spec.format
        .as_deref()
        .map(|f| f.to_ascii_lowercase())
        .or_else(|| file_extension(source))
        .unwrap_or_else(|| "jpg".to_string())
}

/// Rendered variants land next to the source as `{stem}{suffix}.{ext}`.
fn output_path(source: &Path, spec: &VersionSpec, ext: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let suffix = spec.suffix.as_deref().unwrap_or("");
    source.with_file_name(format!("{stem}{suffix}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RenderedImage;
    use async_trait::async_trait;

    fn metadata() -> ImageMetadata {
        ImageMetadata {
            width: 2048,
            height: 1536,
            format: "jpg".to_string(),
            size_bytes: 631_808,
            colorspace: "RGB".to_string(),
            exif: None,
        }
    }

    /// Echoes the requested bounds back as the achieved dimensions.
    struct EchoScaler;

    #[async_trait]
    impl ImageScaler for EchoScaler {
        async fn scale(
            &self,
            _source: &Path,
            output: &Path,
            target: &ResizeTarget,
        ) -> UploadResult<RenderedImage> {
            Ok(RenderedImage {
                path: output.to_path_buf(),
                width: target.max_width.unwrap_or(1),
                height: target.max_height.unwrap_or(1),
            })
        }
    }

    struct FailingScaler;

    #[async_trait]
    impl ImageScaler for FailingScaler {
        async fn scale(
            &self,
            _source: &Path,
            _output: &Path,
            _target: &ResizeTarget,
        ) -> UploadResult<RenderedImage> {
            Err(UploadError::resize(
                None,
                std::io::Error::new(std::io::ErrorKind::InvalidData, "corrupt input"),
            ))
        }
    }

    #[tokio::test]
    async fn artifacts_keep_spec_order() {
        let specs = vec![
            VersionSpec::new().with_max_width(1040).with_max_height(1040).with_suffix("-large"),
            VersionSpec::new().with_max_width(320).with_max_height(320).with_suffix("-small"),
            VersionSpec::original(),
        ];

        let artifacts = resize_versions(
            Arc::new(EchoScaler),
            Path::new("/tmp/photo.jpg"),
            &metadata(),
            specs,
            &UploadConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(artifacts.len(), 3);
        assert_eq!(artifacts[0].spec.suffix.as_deref(), Some("-large"));
        assert_eq!(artifacts[1].spec.suffix.as_deref(), Some("-small"));
        assert!(artifacts[2].spec.is_original);
        assert_eq!(artifacts[2].width, 2048);
        assert_eq!(artifacts[2].local_path, Path::new("/tmp/photo.jpg"));
    }

    #[tokio::test]
    async fn derived_output_lands_next_to_source() {
        let specs = vec![VersionSpec::new()
            .with_max_width(320)
            .with_suffix("-small")
            .with_format("png")];

        let artifacts = resize_versions(
            Arc::new(EchoScaler),
            Path::new("/data/in/photo.jpg"),
            &metadata(),
            specs,
            &UploadConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(
            artifacts[0].local_path,
            Path::new("/data/in/photo-small.png")
        );
        assert_eq!(artifacts[0].mime_type, "image/png");
    }

    #[tokio::test]
    async fn one_failure_fails_the_batch_with_the_version_suffix() {
        let specs = vec![
            VersionSpec::new().with_max_width(320).with_suffix("-small"),
        ];

        let err = resize_versions(
            Arc::new(FailingScaler),
            Path::new("/tmp/photo.jpg"),
            &metadata(),
            specs,
            &UploadConfig::default(),
        )
        .await
        .unwrap_err();

        match err {
            UploadError::Resize { suffix, .. } => assert_eq!(suffix.as_deref(), Some("-small")),
            other => panic!("expected Resize, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn quality_defaults_from_config() {
        struct QualityProbe(std::sync::Mutex<Vec<u8>>);

        #[async_trait]
        impl ImageScaler for QualityProbe {
            async fn scale(
                &self,
                _source: &Path,
                output: &Path,
                target: &ResizeTarget,
            ) -> UploadResult<RenderedImage> {
                self.0.lock().unwrap().push(target.quality);
                Ok(RenderedImage {
                    path: output.to_path_buf(),
                    width: 1,
                    height: 1,
                })
            }
        }

        let scaler = Arc::new(QualityProbe(std::sync::Mutex::new(Vec::new())));
        let specs = vec![
            VersionSpec::new().with_max_width(10),
            VersionSpec::new().with_max_width(10).with_quality(95),
        ];

        resize_versions(
            scaler.clone(),
            Path::new("/tmp/photo.jpg"),
            &metadata(),
            specs,
            &UploadConfig::default().with_default_quality(42),
        )
        .await
        .unwrap();

        assert_eq!(*scaler.0.lock().unwrap(), vec![42, 95]);
    }
}

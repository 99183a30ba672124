//! The upload fan-out stage.
//!
//! Every artifact is put to the object store concurrently under the shared
//! destination path. The first failure fails the whole batch; callers must
//! assume zero-or-all semantics, though objects already written remotely are
//! not rolled back.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use futures::future::try_join_all;
use tracing::debug;

use crate::config::UploadConfig;
use crate::error::{UploadError, UploadResult};
use crate::store::{ObjectStore, PutOptions};
use crate::types::{
    file_extension, mime_for_extension, DestinationPath, ImageMetadata, ResizedArtifact,
    UploadedVersion, VersionSpec,
};
use crate::versions::pass_through;

pub(crate) async fn upload_versions(
    store: Arc<dyn ObjectStore>,
    config: &UploadConfig,
    destination: &DestinationPath,
    mut artifacts: Vec<ResizedArtifact>,
    source: &Path,
    metadata: &ImageMetadata,
) -> UploadResult<Vec<UploadedVersion>> {
    if let Some(overrides) = &config.original {
        let mut spec = overrides.clone();
        spec.is_original = true;
        artifacts.push(pass_through(source, metadata, spec));
    }

    let uploads = artifacts
        .iter()
        .map(|artifact| upload_one(store.clone(), config, destination, artifact));

    let versions = try_join_all(uploads).await?;
    debug!(count = versions.len(), destination = %destination, "upload fan-out complete");
    Ok(versions)
}

async fn upload_one(
    store: Arc<dyn ObjectStore>,
    config: &UploadConfig,
    destination: &DestinationPath,
    artifact: &ResizedArtifact,
) -> UploadResult<UploadedVersion> {
    let key = object_key(destination, &artifact.spec, &artifact.local_path);
    let opts = put_options(config, &artifact.spec, &artifact.local_path);

    let receipt = store
        .put(&key, &artifact.local_path, &opts)
        .await
        .map_err(|e| UploadError::upload(&key, e))?;

    let url = config.url_base.as_ref().map(|base| format!("{base}{key}"));

    Ok(UploadedVersion {
        key,
        etag: receipt.etag,
        url,
        is_original: artifact.spec.is_original,
        local_path: artifact.local_path.clone(),
        width: artifact.width,
        height: artifact.height,
    })
}

/// `destination + suffix + "." + extension`
fn object_key(destination: &DestinationPath, spec: &VersionSpec, local_path: &Path) -> String {
    let ext = file_extension(local_path).unwrap_or_else(|| "jpg".to_string());
    let suffix = spec.suffix.as_deref().unwrap_or("");
    format!("{}{}.{}", destination.as_str(), suffix, ext)
}

fn put_options(config: &UploadConfig, spec: &VersionSpec, local_path: &Path) -> PutOptions {
    let ext = file_extension(local_path).unwrap_or_else(|| "jpg".to_string());
    PutOptions {
        content_type: mime_for_extension(&ext),
        acl: spec
            .acl
            .clone()
            .unwrap_or_else(|| config.default_acl.clone()),
        expires: spec.expires.map(|d| SystemTime::now() + d),
        cache_control: spec
            .max_age
            .map(|secs| format!("public, max-age={secs}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::io::Write;
    use std::time::Duration;

    fn metadata() -> ImageMetadata {
        ImageMetadata {
            width: 2048,
            height: 1536,
            format: "jpg".to_string(),
            size_bytes: 64,
            colorspace: "RGB".to_string(),
            exif: None,
        }
    }

    fn artifact(path: &Path, spec: VersionSpec) -> ResizedArtifact {
        let ext = file_extension(path).unwrap();
        ResizedArtifact {
            local_path: path.to_path_buf(),
            width: 320,
            height: 240,
            mime_type: mime_for_extension(&ext),
            spec,
        }
    }

    fn temp_image(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"pixels").unwrap();
        path
    }

    #[tokio::test]
    async fn key_combines_destination_suffix_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let small = temp_image(&dir, "photo-small.jpg");
        let thumb = temp_image(&dir, "photo-thumb.png");
        let store = Arc::new(MemoryStore::new().with_etag("\"E1\""));

        let versions = upload_versions(
            store.clone(),
            &UploadConfig::default(),
            &DestinationPath("ab/cd/ef".to_string()),
            vec![
                artifact(&small, VersionSpec::new().with_suffix("-small")),
                artifact(&thumb, VersionSpec::new().with_suffix("-thumb")),
            ],
            Path::new("/unused/photo.jpg"),
            &metadata(),
        )
        .await
        .unwrap();

        assert_eq!(versions[0].key, "ab/cd/ef-small.jpg");
        assert_eq!(versions[1].key, "ab/cd/ef-thumb.png");
        assert_eq!(versions[0].etag, "\"E1\"");
        assert!(versions[0].url.is_none());

        let objects = store.objects().await;
        assert_eq!(objects["ab/cd/ef-small.jpg"].options.content_type, "image/jpeg");
        assert_eq!(objects["ab/cd/ef-thumb.png"].options.content_type, "image/png");
    }

    #[tokio::test]
    async fn acl_headers_and_url_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let large = temp_image(&dir, "photo-large.jpg");
        let store = Arc::new(MemoryStore::new());
        let config = UploadConfig::default()
            .with_default_acl("public-read")
            .with_url_base("https://cdn.app.com/");

        let spec = VersionSpec::new()
            .with_suffix("-large")
            .with_acl("private")
            .with_expires(Duration::from_secs(3600))
            .with_max_age(31_536_000);

        let versions = upload_versions(
            store.clone(),
            &config,
            &DestinationPath("ab/cd/ef".to_string()),
            vec![artifact(&large, spec)],
            Path::new("/unused/photo.jpg"),
            &metadata(),
        )
        .await
        .unwrap();

        assert_eq!(
            versions[0].url.as_deref(),
            Some("https://cdn.app.com/ab/cd/ef-large.jpg")
        );

        let objects = store.objects().await;
        let opts = &objects["ab/cd/ef-large.jpg"].options;
        assert_eq!(opts.acl, "private");
        assert!(opts.expires.is_some());
        assert_eq!(
            opts.cache_control.as_deref(),
            Some("public, max-age=31536000")
        );
    }

    #[tokio::test]
    async fn default_acl_applies_without_override() {
        let dir = tempfile::tempdir().unwrap();
        let small = temp_image(&dir, "photo-small.jpg");
        let store = Arc::new(MemoryStore::new());

        upload_versions(
            store.clone(),
            &UploadConfig::default(),
            &DestinationPath("k".to_string()),
            vec![artifact(&small, VersionSpec::new().with_suffix("-small"))],
            Path::new("/unused/photo.jpg"),
            &metadata(),
        )
        .await
        .unwrap();

        let objects = store.objects().await;
        assert_eq!(objects["k-small.jpg"].options.acl, "private");
    }

    #[tokio::test]
    async fn configured_original_is_synthesized() {
        let dir = tempfile::tempdir().unwrap();
        let source = temp_image(&dir, "photo.jpg");
        let small = temp_image(&dir, "photo-small.jpg");
        let store = Arc::new(MemoryStore::new());
        let config =
            UploadConfig::default().with_original(VersionSpec::new().with_acl("private"));

        let versions = upload_versions(
            store.clone(),
            &config,
            &DestinationPath("ab/cd/ef".to_string()),
            vec![artifact(&small, VersionSpec::new().with_suffix("-small"))],
            &source,
            &metadata(),
        )
        .await
        .unwrap();

        assert_eq!(versions.len(), 2);
        let original = versions.iter().find(|v| v.is_original).unwrap();
        assert_eq!(original.key, "ab/cd/ef.jpg");
        assert_eq!(original.width, 2048);
        assert_eq!(original.height, 1536);
        assert_eq!(original.local_path, source);
    }

    #[tokio::test]
    async fn one_failed_put_fails_the_batch() {
        use crate::store::PutReceipt;
        use async_trait::async_trait;

        struct BrokenStore;

        #[async_trait]
        impl ObjectStore for BrokenStore {
            async fn list(&self, _prefix: &str) -> UploadResult<Vec<String>> {
                Ok(vec![])
            }
            async fn put(
                &self,
                _key: &str,
                _source: &Path,
                _opts: &PutOptions,
            ) -> UploadResult<PutReceipt> {
                Err(UploadError::backend(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "socket closed",
                )))
            }
            async fn delete(&self, _keys: &[String]) -> UploadResult<()> {
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let small = temp_image(&dir, "photo-small.jpg");

        let err = upload_versions(
            Arc::new(BrokenStore),
            &UploadConfig::default(),
            &DestinationPath("k".to_string()),
            vec![artifact(&small, VersionSpec::new().with_suffix("-small"))],
            Path::new("/unused/photo.jpg"),
            &metadata(),
        )
        .await
        .unwrap_err();

        match err {
            UploadError::Upload { key, .. } => assert_eq!(key, "k-small.jpg"),
            other => panic!("expected Upload, got {other:?}"),
        }
    }
}

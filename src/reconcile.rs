//! The local cleanup stage.
//!
//! Applies the retention policy to every uploaded version's local file.
//! Deletions run independently and are best-effort: a failed delete is
//! surfaced per file and logged, but never aborts the remaining deletes or
//! fails the pipeline. The remote store is never touched here.

use futures::future::join_all;
use tracing::warn;

use crate::config::RetentionPolicy;
use crate::error::CleanupFailure;
use crate::types::UploadedVersion;

pub(crate) async fn reconcile(
    versions: &[UploadedVersion],
    retention: RetentionPolicy,
) -> Vec<CleanupFailure> {
    let deletions = versions
        .iter()
        .filter(|v| !retention.retains(v.is_original))
        .map(|v| async move {
            match tokio::fs::remove_file(&v.local_path).await {
                Ok(()) => None,
                Err(error) => {
                    warn!(path = %v.local_path.display(), %error, "local cleanup failed");
                    Some(CleanupFailure {
                        path: v.local_path.clone(),
                        error,
                    })
                }
            }
        });

    join_all(deletions).await.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    fn version(path: PathBuf, is_original: bool) -> UploadedVersion {
        UploadedVersion {
            key: "k".to_string(),
            etag: "\"e\"".to_string(),
            url: None,
            is_original,
            local_path: path,
            width: 1,
            height: 1,
        }
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        path
    }

    #[tokio::test]
    async fn retain_versions_deletes_only_the_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = touch(dir.path(), "photo.jpg");
        let small = touch(dir.path(), "photo-small.jpg");

        let failures = reconcile(
            &[
                version(original.clone(), true),
                version(small.clone(), false),
            ],
            RetentionPolicy::new(false, true),
        )
        .await;

        assert!(failures.is_empty());
        assert!(!original.exists());
        assert!(small.exists());
    }

    #[tokio::test]
    async fn no_retention_deletes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let original = touch(dir.path(), "photo.jpg");
        let small = touch(dir.path(), "photo-small.jpg");

        let failures = reconcile(
            &[
                version(original.clone(), true),
                version(small.clone(), false),
            ],
            RetentionPolicy::default(),
        )
        .await;

        assert!(failures.is_empty());
        assert!(!original.exists());
        assert!(!small.exists());
    }

    #[tokio::test]
    async fn full_retention_deletes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let original = touch(dir.path(), "photo.jpg");
        let small = touch(dir.path(), "photo-small.jpg");

        let failures = reconcile(
            &[
                version(original.clone(), true),
                version(small.clone(), false),
            ],
            RetentionPolicy::retain_all(),
        )
        .await;

        assert!(failures.is_empty());
        assert!(original.exists());
        assert!(small.exists());
    }

    #[tokio::test]
    async fn one_failed_delete_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never-existed.jpg");
        let small = touch(dir.path(), "photo-small.jpg");

        let failures = reconcile(
            &[
                version(missing.clone(), false),
                version(small.clone(), false),
            ],
            RetentionPolicy::default(),
        )
        .await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, missing);
        assert!(!small.exists());
    }
}

use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::UploadResult;

/// Object-storage operations the pipeline depends on.
///
/// `put` receives the local path of the body so backends can stream the file
/// themselves. The store must support prefix listing and conditionless
/// overwrite semantics.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Keys of existing objects under the given prefix
    async fn list(&self, prefix: &str) -> UploadResult<Vec<String>>;

    /// Store the file at `source` under `key`, streaming it as the body
    async fn put(&self, key: &str, source: &Path, opts: &PutOptions) -> UploadResult<PutReceipt>;

    /// Delete the given objects
    async fn delete(&self, keys: &[String]) -> UploadResult<()>;
}

/// Headers and access settings for a single put.
#[derive(Debug, Clone)]
pub struct PutOptions {
    pub content_type: String,
    pub acl: String,
    /// Absolute expiry instant for the Expires header
    pub expires: Option<SystemTime>,
    /// Full Cache-Control header value
    pub cache_control: Option<String>,
}

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutReceipt {
    pub etag: String,
}

/// An object recorded by [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub options: PutOptions,
}

/// In-memory [`ObjectStore`] that records every put.
///
/// Useful in tests and as a stand-in backend when embedding the pipeline
/// without remote storage.
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    etag: String,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            etag: "\"memory\"".to_string(),
        }
    }

    /// Use a fixed etag for every put
    pub fn with_etag<S: Into<String>>(mut self, etag: S) -> Self {
        self.etag = etag.into();
        self
    }

    /// Pre-populate an object so its key reads as occupied
    pub async fn seed<S: Into<String>>(&self, key: S) {
        self.objects.write().await.insert(
            key.into(),
            StoredObject {
                body: Bytes::new(),
                options: PutOptions {
                    content_type: "application/octet-stream".to_string(),
                    acl: "private".to_string(),
                    expires: None,
                    cache_control: None,
                },
            },
        );
    }

    /// Snapshot of everything stored so far, keyed by object key
    pub async fn objects(&self) -> BTreeMap<String, StoredObject> {
        self.objects.read().await.clone()
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: &str) -> UploadResult<Vec<String>> {
        let objects = self.objects.read().await;
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn put(&self, key: &str, source: &Path, opts: &PutOptions) -> UploadResult<PutReceipt> {
        let body = Bytes::from(tokio::fs::read(source).await?);
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                body,
                options: opts.clone(),
            },
        );
        Ok(PutReceipt {
            etag: self.etag.clone(),
        })
    }

    async fn delete(&self, keys: &[String]) -> UploadResult<()> {
        let mut objects = self.objects.write().await;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }
}

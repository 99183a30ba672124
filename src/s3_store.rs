//! S3-compatible [`ObjectStore`] backend.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use aws_sdk_s3::types::{Delete, ObjectCannedAcl, ObjectIdentifier};
use aws_sdk_s3::Client;

use crate::error::{UploadError, UploadResult};
use crate::store::{ObjectStore, PutOptions, PutReceipt};

/// Object store backed by S3 or any S3-compatible service (MinIO, R2, ...).
///
/// Timeouts and retries are the client's concern; configure them on the SDK
/// config passed in, not here.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new<S: Into<String>>(client: Client, bucket: S) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the standard AWS environment (credentials chain,
    /// region, endpoint overrides).
    pub async fn from_env<S: Into<String>>(bucket: S) -> Self {
        let config = aws_config::from_env().load().await;
        Self::new(Client::new(&config), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, prefix: &str) -> UploadResult<Vec<String>> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(UploadError::backend)?;

        Ok(output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect())
    }

    async fn put(&self, key: &str, source: &Path, opts: &PutOptions) -> UploadResult<PutReceipt> {
        let body = ByteStream::from_path(source)
            .await
            .map_err(UploadError::backend)?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(&opts.content_type)
            .acl(ObjectCannedAcl::from(opts.acl.as_str()));

        if let Some(expires) = opts.expires {
            request = request.expires(DateTime::from(expires));
        }
        if let Some(cache_control) = &opts.cache_control {
            request = request.cache_control(cache_control);
        }

        let output = request.send().await.map_err(UploadError::backend)?;

        Ok(PutReceipt {
            etag: output.e_tag().unwrap_or_default().to_string(),
        })
    }

    async fn delete(&self, keys: &[String]) -> UploadResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(UploadError::backend)?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(UploadError::backend)?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(UploadError::backend)?;

        Ok(())
    }
}

//! Object storage module
//!
//! [`ObjectStore`] is the narrow storage capability the upload flows depend
//! on; [`S3Storage`] implements it over the AWS SDK.
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | PutObject | `s3.put_object` | bucket, key, bytes, content_type, etag |
//! | HeadObject | `s3.head_object` | bucket, key |
//! | ListObjectsV2 | `s3.list_objects` | bucket, prefix, count |
//! | Presign PUT | `s3.presign_put` | bucket, key, ttl_secs |
//! | Presign GET | `s3.presign_get` | bucket, key, ttl_secs |
//!
//! # Example
//!
//! ```no_run
//! use docvault_gateway::config::AwsConfig;
//! use docvault_gateway::s3::{ObjectStore, S3Storage};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let aws = AwsConfig { use_local_endpoint: true, ..AwsConfig::default() };
//! let storage = S3Storage::from_config(&aws).await;
//! storage
//!     .put_object("ai-powered-documents", "user-1/1700000000000-notes.txt", Bytes::from("hi"), "text/plain")
//!     .await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime as SmithyDateTime};
use aws_sdk_s3::Client;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub mod credentials;

pub use credentials::{load_sdk_config, s3_client, CredentialsSource};

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Transport, auth or service failure reported by the backend
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
}

/// Result of a successful PutObject
#[derive(Debug, Clone, PartialEq)]
pub struct PutObjectOutput {
    pub bucket: String,
    pub key: String,
    pub etag: Option<String>,
}

/// One entry of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Object metadata from HeadObject
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMetadata {
    pub content_type: Option<String>,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    /// `x-amz-meta-*` pairs
    pub metadata: HashMap<String, String>,
}

/// Remote object-storage capability.
///
/// Implementations never retry; every backend failure is returned as
/// [`StorageError::Unavailable`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object, silently replacing any existing one at `key`
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<PutObjectOutput, StorageError>;

    /// Presigned PUT URL bound to `content_type`. Signing is local.
    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String, StorageError>;

    /// Presigned GET URL
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError>;

    /// All objects under `prefix` (an empty prefix lists the whole bucket).
    /// A prefix that matches nothing yields an empty list.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectSummary>, StorageError>;

    /// Metadata of one object, [`StorageError::NotFound`] if absent
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StorageError>;
}

fn unavailable<E>(operation: &str, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::Unavailable(format!("{} failed: {}", operation, DisplayErrorContext(&err)))
}

fn to_chrono(value: Option<&SmithyDateTime>) -> Option<DateTime<Utc>> {
    value
        .and_then(|t| t.to_millis().ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

fn presigning_config(ttl: Duration) -> Result<PresigningConfig, StorageError> {
    PresigningConfig::expires_in(ttl)
        .map_err(|e| StorageError::Unavailable(format!("invalid presign expiry: {}", e)))
}

/// S3-backed [`ObjectStore`]
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from AWS configuration alone
    pub async fn from_config(config: &crate::config::AwsConfig) -> Self {
        let sdk_config = load_sdk_config(config).await;
        Self::new(s3_client(&sdk_config, config))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, body),
        fields(
            s3.bucket = %bucket,
            s3.key = %key,
            upload.bytes = body.len(),
            http.content_type = %content_type,
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<PutObjectOutput, StorageError> {
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| unavailable("PutObject", e))?;

        let etag = output.e_tag().map(str::to_string);
        if let Some(etag) = &etag {
            tracing::Span::current().record("s3.etag", etag.as_str());
        }
        tracing::debug!("PutObject completed");

        Ok(PutObjectOutput {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag,
        })
    }

    #[tracing::instrument(
        name = "s3.presign_put",
        skip(self),
        fields(s3.bucket = %bucket, s3.key = %key, presign.ttl_secs = ttl.as_secs()),
        err
    )]
    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let presigned = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning_config(ttl)?)
            .await
            .map_err(|e| unavailable("Presign PutObject", e))?;

        Ok(presigned.uri().to_string())
    }

    #[tracing::instrument(
        name = "s3.presign_get",
        skip(self),
        fields(s3.bucket = %bucket, s3.key = %key, presign.ttl_secs = ttl.as_secs()),
        err
    )]
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config(ttl)?)
            .await
            .map_err(|e| unavailable("Presign GetObject", e))?;

        Ok(presigned.uri().to_string())
    }

    #[tracing::instrument(
        name = "s3.list_objects",
        skip(self),
        fields(s3.bucket = %bucket, s3.prefix = %prefix, s3.count = tracing::field::Empty),
        err
    )]
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectSummary>, StorageError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);
            if !prefix.is_empty() {
                request = request.prefix(prefix);
            }
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| unavailable("ListObjectsV2", e))?;

            objects.extend(response.contents().iter().map(|obj| ObjectSummary {
                key: obj.key().unwrap_or_default().to_string(),
                size: obj.size().unwrap_or(0).max(0) as u64,
                last_modified: to_chrono(obj.last_modified()),
            }));

            match (response.is_truncated(), response.next_continuation_token()) {
                (Some(true), Some(token)) => continuation_token = Some(token.to_string()),
                _ => break,
            }
        }

        tracing::Span::current().record("s3.count", objects.len());
        Ok(objects)
    }

    #[tracing::instrument(
        name = "s3.head_object",
        skip(self),
        fields(s3.bucket = %bucket, s3.key = %key),
        err
    )]
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StorageError> {
        let output = match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) => {
                // HEAD responses carry no error body, so go by status
                let not_found = err
                    .raw_response()
                    .map(|response| response.status().as_u16() == 404)
                    .unwrap_or(false);
                if not_found {
                    return Err(StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    });
                }
                return Err(unavailable("HeadObject", err));
            }
        };

        Ok(ObjectMetadata {
            content_type: output.content_type().map(str::to_string),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            last_modified: to_chrono(output.last_modified()),
            metadata: output.metadata().cloned().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AwsConfig;

    fn local_config() -> AwsConfig {
        AwsConfig {
            use_local_endpoint: true,
            local_endpoint: "http://localhost:4566".into(),
            ..AwsConfig::default()
        }
    }

    #[test]
    fn test_to_chrono() {
        let t = SmithyDateTime::from_millis(1_700_000_000_123);
        let converted = to_chrono(Some(&t)).unwrap();
        assert_eq!(converted.timestamp_millis(), 1_700_000_000_123);
        assert!(to_chrono(None).is_none());
    }

    #[test]
    fn test_presigning_config_rejects_long_expiry() {
        assert!(presigning_config(Duration::from_secs(900)).is_ok());
        assert!(presigning_config(Duration::from_secs(8 * 24 * 3600)).is_err());
    }

    #[tokio::test]
    async fn test_presign_put_is_local() {
        let storage = S3Storage::from_config(&local_config()).await;
        let url = storage
            .presign_put(
                "ai-powered-resumes",
                "user-1/1700000000000-cv.pdf",
                "application/pdf",
                Duration::from_secs(900),
            )
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:4566/ai-powered-resumes/user-1/"));
        assert!(url.contains("X-Amz-Expires=900"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn test_presign_get_is_local() {
        let storage = S3Storage::from_config(&local_config()).await;
        let url = storage
            .presign_get(
                "ai-powered-documents",
                "user-1/1700000000000-notes.txt",
                Duration::from_secs(3600),
            )
            .await
            .unwrap();

        assert!(url.contains("/ai-powered-documents/user-1/1700000000000-notes.txt"));
        assert!(url.contains("X-Amz-Expires=3600"));
    }
}

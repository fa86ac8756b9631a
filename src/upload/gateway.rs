//! Upload gateway
//!
//! Orchestrates proxied uploads and presigned handshakes. Both flows share
//! one precondition pipeline:
//!
//! 1. resolve the caller (`Unauthorized` if absent)
//! 2. validate (flow-specific)
//! 3. route the logical type to a bucket
//! 4. derive the storage key
//!
//! Only then does the flow touch storage, so every rejection leaves the
//! backend untouched.
//!
//! # Example
//!
//! ```no_run
//! use docvault_gateway::auth::UserId;
//! use docvault_gateway::clock::SystemClock;
//! use docvault_gateway::config::AwsConfig;
//! use docvault_gateway::s3::S3Storage;
//! use docvault_gateway::upload::{LogicalType, UploadGateway};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = S3Storage::from_config(&AwsConfig::default()).await;
//! let gateway = UploadGateway::new(Arc::new(storage), Arc::new(SystemClock));
//! let owner = UserId::new("user_2abc");
//! let presigned = gateway
//!     .request_presigned_upload(Some(&owner), LogicalType::Resume, "cv.pdf", "application/pdf", None)
//!     .await?;
//! println!("PUT to {} within {}s", presigned.url, presigned.expires_in_seconds);
//! # Ok(())
//! # }
//! ```

use super::key::{derive_key, owner_prefix, LogicalType, StorageKey};
use super::validate::{validate_content_type, validate_request};
use super::{PresignedDownload, PresignedUpload, UploadError, UploadRequest, UploadResult};
use crate::auth::UserId;
use crate::clock::Clock;
use crate::config::MAX_PRESIGN_TTL_SECS;
use crate::metrics;
use crate::s3::{ObjectMetadata, ObjectStore, ObjectSummary};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Expiry of presigned upload URLs
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 900;
/// Expiry of presigned download URLs
pub const DEFAULT_DOWNLOAD_TTL_SECS: u64 = 3600;

/// Output of the shared precondition pipeline
#[derive(Debug)]
struct Prepared {
    owner: UserId,
    bucket: &'static str,
    key: StorageKey,
}

/// Upload orchestration over an [`ObjectStore`]
#[derive(Clone)]
pub struct UploadGateway {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
}

impl UploadGateway {
    pub fn new(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Upload the request payload through the gateway.
    ///
    /// Exactly one storage write on success, none on any rejection.
    #[tracing::instrument(
        name = "upload.proxied",
        skip(self, request),
        fields(
            upload.type = %request.logical_type,
            upload.bytes = request.size,
            http.content_type = %request.content_type,
            s3.bucket = tracing::field::Empty,
            s3.key = tracing::field::Empty
        ),
        err(Display)
    )]
    pub async fn proxied_upload(
        &self,
        request: UploadRequest,
    ) -> Result<UploadResult, UploadError> {
        let prepared = self.prepare(
            request.owner.as_ref(),
            request.logical_type,
            &request.filename,
            || validate_request(&request),
        )?;

        // validate_request guarantees a payload
        let payload = request.payload.ok_or(UploadError::MissingFile)?;

        let start_time = Instant::now();
        let outcome = self
            .store
            .put_object(
                prepared.bucket,
                prepared.key.as_str(),
                payload,
                &request.content_type,
            )
            .await;
        let duration = start_time.elapsed();
        metrics::record_upload_duration(prepared.bucket, "put", duration.as_secs_f64());

        match outcome {
            Ok(output) => {
                metrics::record_upload_success(prepared.bucket, request.size);
                tracing::info!(
                    user_id = %prepared.owner,
                    etag = ?output.etag,
                    duration_ms = duration.as_millis(),
                    "Proxied upload completed"
                );

                Ok(UploadResult {
                    url: format!("s3://{}/{}", prepared.bucket, prepared.key),
                    bucket: prepared.bucket.to_string(),
                    key: prepared.key,
                    filename: request.filename,
                    size: request.size,
                    content_type: request.content_type,
                })
            }
            Err(e) => {
                metrics::record_upload_failure(prepared.bucket);
                metrics::record_error("storage");
                tracing::error!(
                    error = %e,
                    duration_ms = duration.as_millis(),
                    "Proxied upload failed"
                );
                Err(e.into())
            }
        }
    }

    /// Issue a presigned PUT for a direct upload.
    ///
    /// The content type is validated; the size is not, since no payload
    /// exists yet. Size limits for this path are left to the client or to
    /// bucket policy.
    #[tracing::instrument(
        name = "upload.presign",
        skip(self, owner),
        fields(s3.bucket = tracing::field::Empty, s3.key = tracing::field::Empty),
        err(Display)
    )]
    pub async fn request_presigned_upload(
        &self,
        owner: Option<&UserId>,
        logical_type: LogicalType,
        filename: &str,
        content_type: &str,
        ttl_secs: Option<u64>,
    ) -> Result<PresignedUpload, UploadError> {
        let prepared = self.prepare(owner, logical_type, filename, || {
            validate_content_type(content_type)
        })?;
        let ttl = resolve_ttl(ttl_secs, DEFAULT_PRESIGN_TTL_SECS)?;

        let url = self
            .store
            .presign_put(prepared.bucket, prepared.key.as_str(), content_type, ttl)
            .await
            .map_err(|e| storage_failure("presign_put", e))?;

        metrics::record_presign(prepared.bucket, "PUT");
        tracing::info!(user_id = %prepared.owner, "Presigned upload URL issued");

        Ok(PresignedUpload {
            url,
            bucket: prepared.bucket.to_string(),
            key: prepared.key,
            expires_in_seconds: ttl.as_secs(),
        })
    }

    /// The caller's objects in the bucket for `logical_type`
    #[tracing::instrument(name = "upload.list", skip(self, owner), err(Display))]
    pub async fn list_uploads(
        &self,
        owner: Option<&UserId>,
        logical_type: LogicalType,
    ) -> Result<Vec<ObjectSummary>, UploadError> {
        let owner = resolve_owner(owner)?;
        self.store
            .list_objects(logical_type.bucket(), &owner_prefix(owner))
            .await
            .map_err(|e| storage_failure("list_objects", e))
    }

    /// Presigned GET for one of the caller's objects.
    ///
    /// Keys outside the caller's prefix are reported as `NotFound`.
    #[tracing::instrument(name = "upload.download_url", skip(self, owner), err(Display))]
    pub async fn download_url(
        &self,
        owner: Option<&UserId>,
        logical_type: LogicalType,
        key: &str,
        ttl_secs: Option<u64>,
    ) -> Result<PresignedDownload, UploadError> {
        let key = owned_key(owner, key)?;
        let ttl = resolve_ttl(ttl_secs, DEFAULT_DOWNLOAD_TTL_SECS)?;
        let bucket = logical_type.bucket();

        let url = self
            .store
            .presign_get(bucket, key.as_str(), ttl)
            .await
            .map_err(|e| storage_failure("presign_get", e))?;
        metrics::record_presign(bucket, "GET");

        Ok(PresignedDownload {
            url,
            bucket: bucket.to_string(),
            key,
            expires_in_seconds: ttl.as_secs(),
        })
    }

    /// Metadata of one of the caller's objects
    #[tracing::instrument(name = "upload.describe", skip(self, owner), err(Display))]
    pub async fn describe(
        &self,
        owner: Option<&UserId>,
        logical_type: LogicalType,
        key: &str,
    ) -> Result<ObjectMetadata, UploadError> {
        let key = owned_key(owner, key)?;
        self.store
            .head_object(logical_type.bucket(), key.as_str())
            .await
            .map_err(|e| storage_failure("head_object", e))
    }

    /// Identity, validation, bucket routing, key derivation
    fn prepare<F>(
        &self,
        owner: Option<&UserId>,
        logical_type: LogicalType,
        filename: &str,
        check: F,
    ) -> Result<Prepared, UploadError>
    where
        F: FnOnce() -> Result<(), UploadError>,
    {
        let owner = resolve_owner(owner)?;

        if let Err(e) = check() {
            metrics::record_validation_rejection(e.code());
            tracing::info!(user_id = %owner, reason = e.code(), "Upload rejected");
            return Err(e);
        }

        let bucket = logical_type.bucket();
        let key = derive_key(owner, filename, self.clock.as_ref());

        let span = tracing::Span::current();
        span.record("s3.bucket", bucket);
        span.record("s3.key", key.as_str());

        Ok(Prepared {
            owner: owner.clone(),
            bucket,
            key,
        })
    }
}

fn resolve_owner(owner: Option<&UserId>) -> Result<&UserId, UploadError> {
    owner.ok_or_else(|| {
        metrics::record_validation_rejection(UploadError::Unauthorized.code());
        UploadError::Unauthorized
    })
}

fn owned_key(owner: Option<&UserId>, key: &str) -> Result<StorageKey, UploadError> {
    let owner = resolve_owner(owner)?;
    let key = StorageKey::from(key.to_string());
    if key.is_owned_by(owner) {
        Ok(key)
    } else {
        tracing::info!(user_id = %owner, key = %key, "Key outside caller prefix");
        Err(UploadError::NotFound(key.into_string()))
    }
}

/// Default when unset, clamp to the S3 maximum, reject zero
fn resolve_ttl(ttl_secs: Option<u64>, default_secs: u64) -> Result<Duration, UploadError> {
    match ttl_secs.unwrap_or(default_secs) {
        0 => Err(UploadError::BadRequest("expiry must be positive".into())),
        secs => Ok(Duration::from_secs(secs.min(MAX_PRESIGN_TTL_SECS))),
    }
}

fn storage_failure(operation: &str, err: crate::s3::StorageError) -> UploadError {
    if matches!(err, crate::s3::StorageError::Unavailable(_)) {
        metrics::record_error("storage");
        tracing::error!(operation, error = %err, "Storage call failed");
    }
    err.into()
}

//! Upload module
//!
//! Key namespace, validation and the two upload flows (proxied and
//! presigned) built on [`crate::s3::ObjectStore`].

use crate::auth::UserId;
use crate::s3::StorageError;
use bytes::Bytes;
use thiserror::Error;

pub mod gateway;
pub mod key;
pub mod validate;

pub use gateway::UploadGateway;
pub use key::{derive_key, route_bucket, sanitize_filename, LogicalType, StorageKey};
pub use validate::{validate, validate_content_type, validate_request, MAX_UPLOAD_BYTES};

/// Upload errors
///
/// `Display` may carry internal detail for logs; clients only ever see
/// [`UploadError::public_message`].
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid file type: {0}")]
    InvalidType(String),

    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("No file provided")]
    MissingFile,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server-side fault unrelated to storage, e.g. a misconfigured authenticator
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::Unauthorized => "unauthorized",
            UploadError::InvalidType(_) => "invalid_type",
            UploadError::TooLarge { .. } => "too_large",
            UploadError::MissingFile => "missing_file",
            UploadError::StorageUnavailable(_) => "storage_unavailable",
            UploadError::NotFound(_) => "not_found",
            UploadError::BadRequest(_) => "bad_request",
            UploadError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> u16 {
        match self {
            UploadError::Unauthorized => 401,
            UploadError::InvalidType(_)
            | UploadError::TooLarge { .. }
            | UploadError::MissingFile
            | UploadError::BadRequest(_) => 400,
            UploadError::NotFound(_) => 404,
            UploadError::StorageUnavailable(_) | UploadError::Internal(_) => 500,
        }
    }

    /// Message safe to return to clients
    pub fn public_message(&self) -> String {
        match self {
            UploadError::Unauthorized => "Unauthorized".into(),
            UploadError::InvalidType(_) => {
                "Invalid file type. Only PDF, DOC, DOCX, and TXT files are allowed.".into()
            }
            UploadError::TooLarge { max, .. } => {
                format!("File too large. Maximum size is {}MB.", max / (1024 * 1024))
            }
            UploadError::MissingFile => "No file provided".into(),
            UploadError::StorageUnavailable(_) => "Failed to upload file".into(),
            UploadError::NotFound(_) => "File not found".into(),
            UploadError::BadRequest(reason) => reason.clone(),
            UploadError::Internal(_) => "Internal server error".into(),
        }
    }

    /// Rejected before any storage call
    pub fn is_validation(&self) -> bool {
        self.status() == 400
    }
}

impl From<StorageError> for UploadError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(cause) => UploadError::StorageUnavailable(cause),
            StorageError::NotFound { bucket, key } => {
                UploadError::NotFound(format!("{}/{}", bucket, key))
            }
        }
    }
}

/// A proxied upload as received from the client
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// `None` when no identity could be resolved
    pub owner: Option<UserId>,
    pub logical_type: LogicalType,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub payload: Option<Bytes>,
}

/// Result of a successful proxied upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub bucket: String,
    pub key: StorageKey,
    /// Canonical `s3://{bucket}/{key}` URL
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

/// A presigned PUT handed back to the client
#[derive(Debug, Clone, PartialEq)]
pub struct PresignedUpload {
    pub url: String,
    pub bucket: String,
    pub key: StorageKey,
    pub expires_in_seconds: u64,
}

/// A presigned GET for one of the caller's objects
#[derive(Debug, Clone, PartialEq)]
pub struct PresignedDownload {
    pub url: String,
    pub bucket: String,
    pub key: StorageKey,
    pub expires_in_seconds: u64,
}

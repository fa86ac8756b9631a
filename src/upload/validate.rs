//! Upload validation
//!
//! Pure checks that run before any storage call.

use super::{UploadError, UploadRequest};

/// Largest accepted proxied upload (5 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// PDF, DOC, DOCX and plain text
pub const ALLOWED_CONTENT_TYPES: [&str; 4] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

/// Check a content type against the allow-list (exact match)
pub fn validate_content_type(content_type: &str) -> Result<(), UploadError> {
    if ALLOWED_CONTENT_TYPES.contains(&content_type) {
        Ok(())
    } else {
        Err(UploadError::InvalidType(content_type.to_string()))
    }
}

/// Check type, then size
pub fn validate(content_type: &str, size: u64) -> Result<(), UploadError> {
    validate_content_type(content_type)?;
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size,
            max: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// Validate a proxied upload: payload presence, then type, then size
pub fn validate_request(request: &UploadRequest) -> Result<(), UploadError> {
    if request.payload.is_none() {
        return Err(UploadError::MissingFile);
    }
    validate(&request.content_type, request.size)
}

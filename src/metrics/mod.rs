//! Metrics module
//!
//! Prometheus counters and histograms for uploads, presigned URLs,
//! validation, authentication and secret loading.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "docvault_uploads_total",
        "Total number of proxied uploads",
        &["bucket", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "docvault_upload_bytes_total",
        "Total bytes uploaded through the gateway"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "docvault_upload_duration_seconds",
        "Storage call duration in seconds",
        &["bucket", "method"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    ).unwrap();

    // Presigned URL metrics
    pub static ref PRESIGNED_URLS_TOTAL: CounterVec = register_counter_vec!(
        "docvault_presigned_urls_total",
        "Presigned URLs issued",
        &["bucket", "method"]  // "PUT" or "GET"
    ).unwrap();

    // Validation metrics
    pub static ref VALIDATION_REJECTIONS: CounterVec = register_counter_vec!(
        "docvault_validation_rejections_total",
        "Requests rejected before any storage call",
        &["reason"]
    ).unwrap();

    // Auth metrics
    pub static ref AUTH_ATTEMPTS: CounterVec = register_counter_vec!(
        "docvault_auth_attempts_total",
        "Authentication attempts",
        &["method", "status"]
    ).unwrap();

    // Secrets metrics
    pub static ref SECRETS_LOADS: CounterVec = register_counter_vec!(
        "docvault_secrets_loads_total",
        "Secret cache populations",
        &["origin"]  // "service" or "environment"
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "docvault_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(bucket: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(bucket: &str) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "failure"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(bucket: &str, method: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[bucket, method])
        .observe(duration_secs);
}

/// Record an issued presigned URL
pub fn record_presign(bucket: &str, method: &str) {
    PRESIGNED_URLS_TOTAL
        .with_label_values(&[bucket, method])
        .inc();
}

/// Record a validation rejection by error code
pub fn record_validation_rejection(reason: &str) {
    VALIDATION_REJECTIONS.with_label_values(&[reason]).inc();
}

/// Record authentication attempt
pub fn record_auth_attempt(method: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    AUTH_ATTEMPTS.with_label_values(&[method, status]).inc();
}

/// Record a secret cache population
pub fn record_secrets_load(origin: &str) {
    SECRETS_LOADS.with_label_values(&[origin]).inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

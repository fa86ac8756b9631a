//! Storage key namespace
//!
//! Keys have the form `{owner}/{unixMillis}-{sanitizedFilename}`. The layout
//! is persisted in existing buckets and must not change.

use crate::auth::UserId;
use crate::clock::Clock;
use lazy_static::lazy_static;
use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bucket for `type=resume`
pub const RESUME_BUCKET: &str = "ai-powered-resumes";
/// Bucket for every other type
pub const DOCUMENT_BUCKET: &str = "ai-powered-documents";

lazy_static! {
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9.-]").unwrap();
}

/// Logical upload type, used only for bucket routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    Resume,
    #[default]
    Document,
}

impl LogicalType {
    /// Total parse: anything but `resume` is a document
    pub fn parse(value: &str) -> Self {
        match value {
            "resume" => LogicalType::Resume,
            _ => LogicalType::Document,
        }
    }

    pub fn bucket(&self) -> &'static str {
        match self {
            LogicalType::Resume => RESUME_BUCKET,
            LogicalType::Document => DOCUMENT_BUCKET,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::Resume => "resume",
            LogicalType::Document => "document",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket for an optional raw `type` value
pub fn route_bucket(logical_type: Option<&str>) -> &'static str {
    LogicalType::parse(logical_type.unwrap_or_default()).bucket()
}

/// Object key inside a bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Whether this key lives under `owner`'s prefix
    pub fn is_owned_by(&self, owner: &UserId) -> bool {
        self.0
            .strip_prefix(owner.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for StorageKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
///
/// One `_` per UTF-16 code unit, so a character outside the Basic
/// Multilingual Plane becomes `__`, matching keys written by browser clients.
pub fn sanitize_filename(filename: &str) -> String {
    UNSAFE_FILENAME_CHARS
        .replace_all(filename, |caps: &Captures<'_>| {
            "_".repeat(caps[0].chars().map(char::len_utf16).sum())
        })
        .into_owned()
}

/// Prefix under which all of `owner`'s objects live
pub fn owner_prefix(owner: &UserId) -> String {
    format!("{}/", owner)
}

/// Derive the key for a new object. Deterministic for one clock reading.
///
/// Two uploads of the same filename by the same owner within one millisecond
/// get the same key; the later write replaces the earlier object.
pub fn derive_key(owner: &UserId, filename: &str, clock: &dyn Clock) -> StorageKey {
    StorageKey(format!(
        "{}{}-{}",
        owner_prefix(owner),
        clock.now_millis(),
        sanitize_filename(filename)
    ))
}

//! Docvault Gateway Library
//!
//! Resume and document uploads into S3, either proxied through the gateway or
//! direct with a presigned URL, plus a cached secret store.
//!
//! # Features
//!
//! - **Two upload paths**: `POST /api/upload` (multipart) and presigned PUT URLs
//! - **Stable key layout**: `{owner}/{unixMillis}-{sanitizedFilename}`
//! - **Validation first**: type allow-list and 5 MiB ceiling before any storage call
//! - **Secret cache**: AWS Secrets Manager with environment fallback
//! - **Auth**: JWT (HS256/RS256/ES256) or a fixed development identity
//!
//! # Example
//!
//! ```no_run
//! use docvault_gateway::{config::Config, server::{AppState, Server}};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let state = Arc::new(AppState::from_config(&config).await?);
//!     Server::bind(&config.server.address, state).await?.run().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod clock;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod s3;
pub mod secrets;
pub mod server;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::{AppState, Server};
pub use upload::{UploadError, UploadGateway};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Configuration module for Docvault Gateway
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Longest expiry S3 accepts for a SigV4 presigned URL (7 days)
pub const MAX_PRESIGN_TTL_SECS: u64 = 604_800;

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.address.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid server address '{}'",
                self.server.address
            )));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "server.max_body_bytes must be greater than zero".into(),
            ));
        }

        if self.aws.region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "aws.region cannot be empty".into(),
            ));
        }

        if self.aws.use_local_endpoint && !is_valid_http_url(&self.aws.local_endpoint) {
            return Err(ConfigError::ValidationError(
                "Invalid aws.local_endpoint: must start with http:// or https://".into(),
            ));
        }

        if self.aws.access_key.is_some() != self.aws.secret_key.is_some() {
            return Err(ConfigError::ValidationError(
                "aws.access_key and aws.secret_key must be set together".into(),
            ));
        }

        if self.aws.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "aws.timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.secrets.use_secrets_service && self.secrets.secret_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "secrets.secret_id cannot be empty when the secrets service is enabled".into(),
            ));
        }

        self.auth.validate()?;

        if self.metrics.enabled && self.metrics.address.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid metrics address '{}'",
                self.metrics.address
            )));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    /// Upper bound on a buffered request body. Uploads are capped at 5 MiB by
    /// validation; this leaves room for multipart framing.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_max_body_bytes() -> usize {
    6291456 // 6MB
}

/// AWS connectivity shared by the storage and secrets clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,
    /// Route storage and secrets calls to a local emulator (LocalStack)
    #[serde(default)]
    pub use_local_endpoint: bool,
    #[serde(default = "default_local_endpoint")]
    pub local_endpoint: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Per-operation timeout applied by the SDK clients
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            use_local_endpoint: false,
            local_endpoint: default_local_endpoint(),
            access_key: None,
            secret_key: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_local_endpoint() -> String {
    "http://localhost:4566".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Secrets source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default)]
    pub use_secrets_service: bool,
    #[serde(default = "default_secret_id")]
    pub secret_id: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            use_secrets_service: false,
            secret_id: default_secret_id(),
        }
    }
}

fn default_secret_id() -> String {
    "ai-powered-secrets".to_string()
}

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Treat every request as the fixed test identity. Development only.
    #[serde(default)]
    pub skip_for_testing: bool,
    #[serde(default)]
    pub jwt: Option<JwtConfig>,
}

impl AuthConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.skip_for_testing {
            return Ok(());
        }

        let jwt = self.jwt.as_ref().ok_or_else(|| {
            ConfigError::ValidationError(
                "auth.jwt is required unless auth.skip_for_testing is set".into(),
            )
        })?;

        match jwt.algorithm.to_uppercase().as_str() {
            "HS256" => {}
            "RS256" | "ES256" => {
                if jwt.secret_name.is_some() {
                    return Err(ConfigError::ValidationError(format!(
                        "auth.jwt.secret_name is only supported for HS256, not {}",
                        jwt.algorithm
                    )));
                }
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid JWT algorithm '{}': must be 'HS256', 'RS256', or 'ES256'",
                    other
                )))
            }
        }

        if jwt.secret.is_none() && jwt.secret_name.is_none() {
            return Err(ConfigError::ValidationError(
                "auth.jwt needs either secret or secret_name".into(),
            ));
        }

        Ok(())
    }
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Inline HMAC secret or PEM public key
    #[serde(default)]
    pub secret: Option<String>,
    /// Name of an HMAC secret resolved through the secret store on each request
    #[serde(default)]
    pub secret_name: Option<String>,
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            server: ServerConfig {
                address: "127.0.0.1:3000".into(),
                max_body_bytes: default_max_body_bytes(),
            },
            aws: AwsConfig::default(),
            secrets: SecretsConfig::default(),
            auth: AuthConfig {
                skip_for_testing: false,
                jwt: Some(JwtConfig {
                    secret: Some("secret".into()),
                    secret_name: None,
                    algorithm: "HS256".into(),
                    issuer: None,
                    audience: None,
                }),
            },
            metrics: MetricsConfig::default(),
        }
    }

    #[test]
    fn test_default_aws_config() {
        let config = AwsConfig::default();
        assert_eq!(config.region, "us-east-1");
        assert!(!config.use_local_endpoint);
        assert_eq!(config.local_endpoint, "http://localhost:4566");
    }

    #[test]
    fn test_valid_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_server_address() {
        let mut config = test_config();
        config.server.address = "not-an-address".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_local_endpoint_must_be_http() {
        let mut config = test_config();
        config.aws.use_local_endpoint = true;
        config.aws.local_endpoint = "localhost:4566".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_half_configured_credentials_rejected() {
        let mut config = test_config();
        config.aws.access_key = Some("AKIA".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_jwt_required_without_skip() {
        let mut config = test_config();
        config.auth.jwt = None;
        assert!(config.validate().is_err());

        config.auth.skip_for_testing = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secret_name_requires_hs256() {
        let mut config = test_config();
        if let Some(jwt) = config.auth.jwt.as_mut() {
            jwt.secret = None;
            jwt.secret_name = Some("CLERK_SECRET_KEY".into());
            jwt.algorithm = "RS256".into();
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_jwt_algorithm_rejected() {
        let mut config = test_config();
        if let Some(jwt) = config.auth.jwt.as_mut() {
            jwt.algorithm = "none".into();
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_secret_id_rejected_when_enabled() {
        let mut config = test_config();
        config.secrets.use_secrets_service = true;
        config.secrets.secret_id = " ".into();
        assert!(config.validate().is_err());
    }
}

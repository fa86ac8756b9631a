//! Authentication module
//!
//! Resolves the caller's identity. Upload flows only need a [`UserId`]; how it
//! is established (JWT, fixed development identity) stays behind the
//! [`Authenticator`] trait.

use crate::config::AuthConfig;
use crate::secrets::SecretStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod jwt;

use jwt::{JwtAuthenticator, SecretStoreJwtAuthenticator};

/// Identity used when `auth.skip_for_testing` is enabled
pub const TEST_USER_ID: &str = "test-user-123";

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Authenticator misconfigured: {0}")]
    Misconfigured(String),
}

/// Opaque identifier of an authenticated user
///
/// Used verbatim as the first segment of every storage key the user owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: UserId,
    pub claims: HashMap<String, serde_json::Value>,
}

/// Authenticator trait
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate a request
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Short label used in logs and metrics
    fn method(&self) -> &'static str;
}

/// Authentication request context
#[derive(Debug, Default)]
pub struct AuthRequest {
    /// Header names are lower-cased
    pub headers: HashMap<String, String>,
    pub query: Option<String>,
    pub method: String,
    pub path: String,
}

/// Accepts every request as the same user.
///
/// Mirrors the development bypass of the hosted auth provider; never enable
/// it in production.
pub struct FixedIdentityAuthenticator {
    user_id: UserId,
}

impl FixedIdentityAuthenticator {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
        }
    }
}

#[async_trait]
impl Authenticator for FixedIdentityAuthenticator {
    async fn authenticate(&self, _request: &AuthRequest) -> Result<Identity, AuthError> {
        tracing::debug!(user_id = %self.user_id, "Authentication bypassed");
        Ok(Identity {
            user_id: self.user_id.clone(),
            claims: HashMap::new(),
        })
    }

    fn method(&self) -> &'static str {
        "fixed"
    }
}

/// Build the authenticator described by configuration
pub fn build_authenticator(
    config: &AuthConfig,
    secrets: Arc<SecretStore>,
) -> Result<Arc<dyn Authenticator>, AuthError> {
    if config.skip_for_testing {
        tracing::warn!(
            user_id = TEST_USER_ID,
            "auth.skip_for_testing enabled - every request uses the test identity"
        );
        return Ok(Arc::new(FixedIdentityAuthenticator::new(TEST_USER_ID)));
    }

    let jwt = config
        .jwt
        .as_ref()
        .ok_or_else(|| AuthError::Misconfigured("no JWT configuration".into()))?;

    if let Some(secret_name) = &jwt.secret_name {
        let mut auth = SecretStoreJwtAuthenticator::new(secrets, secret_name);
        if let Some(issuer) = &jwt.issuer {
            auth = auth.with_issuer(issuer);
        }
        if let Some(audience) = &jwt.audience {
            auth = auth.with_audience(audience);
        }
        return Ok(Arc::new(auth));
    }

    let secret = jwt
        .secret
        .as_deref()
        .ok_or_else(|| AuthError::Misconfigured("JWT secret not set".into()))?;

    let mut auth = match jwt.algorithm.to_uppercase().as_str() {
        "HS256" => JwtAuthenticator::new_hs256(secret),
        "RS256" => JwtAuthenticator::new_rs256(secret)?,
        "ES256" => JwtAuthenticator::new_es256(secret)?,
        alg => {
            return Err(AuthError::Misconfigured(format!(
                "unsupported JWT algorithm {}",
                alg
            )))
        }
    };
    if let Some(issuer) = &jwt.issuer {
        auth = auth.with_issuer(issuer);
    }
    if let Some(audience) = &jwt.audience {
        auth = auth.with_audience(audience);
    }

    Ok(Arc::new(auth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::secrets::SecretStore;

    #[test]
    fn test_user_id_display() {
        let id = UserId::new("user_2abc");
        assert_eq!(id.to_string(), "user_2abc");
        assert_eq!(id.as_str(), "user_2abc");
    }

    #[tokio::test]
    async fn test_fixed_identity() {
        let auth = FixedIdentityAuthenticator::new(TEST_USER_ID);
        let identity = auth.authenticate(&AuthRequest::default()).await.unwrap();
        assert_eq!(identity.user_id.as_str(), "test-user-123");
    }

    #[tokio::test]
    async fn test_build_skip_for_testing() {
        let config = AuthConfig {
            skip_for_testing: true,
            jwt: None,
        };
        let auth = build_authenticator(&config, Arc::new(SecretStore::disabled())).unwrap();
        assert_eq!(auth.method(), "fixed");
    }

    #[test]
    fn test_build_without_jwt_fails() {
        let config = AuthConfig::default();
        let result = build_authenticator(&config, Arc::new(SecretStore::disabled()));
        assert!(matches!(result, Err(AuthError::Misconfigured(_))));
    }

    #[test]
    fn test_build_hs256() {
        let config = AuthConfig {
            skip_for_testing: false,
            jwt: Some(JwtConfig {
                secret: Some("secret".into()),
                secret_name: None,
                algorithm: "hs256".into(),
                issuer: Some("https://clerk.example.com".into()),
                audience: None,
            }),
        };
        let auth = build_authenticator(&config, Arc::new(SecretStore::disabled())).unwrap();
        assert_eq!(auth.method(), "jwt");
    }

    #[test]
    fn test_build_secret_store_backed() {
        let config = AuthConfig {
            skip_for_testing: false,
            jwt: Some(JwtConfig {
                secret: None,
                secret_name: Some("CLERK_SECRET_KEY".into()),
                algorithm: "HS256".into(),
                issuer: None,
                audience: None,
            }),
        };
        let auth = build_authenticator(&config, Arc::new(SecretStore::disabled())).unwrap();
        assert_eq!(auth.method(), "jwt");
    }
}

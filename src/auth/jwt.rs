//! JWT Authentication
//!
//! Supports HS256, RS256 and ES256 bearer tokens. The `sub` claim becomes the
//! caller's [`UserId`].

use super::{AuthError, AuthRequest, Authenticator, Identity, UserId};
use crate::metrics;
use crate::secrets::SecretStore;
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// JWT Claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: Option<usize>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
}

/// JWT Authenticator
///
/// # Example
///
/// ```
/// use docvault_gateway::auth::jwt::JwtAuthenticator;
///
/// let auth = JwtAuthenticator::new_hs256("my-secret")
///     .with_issuer("https://auth.example.com")
///     .with_audience("docvault");
/// ```
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

fn validation_for(algorithm: Algorithm) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = true;
    // aud is only checked once an audience is configured
    validation.validate_aud = false;
    validation
}

impl JwtAuthenticator {
    /// Create a new JWT authenticator with a shared secret (HS256)
    pub fn new_hs256(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: validation_for(Algorithm::HS256),
        }
    }

    /// Create a new JWT authenticator with an RSA public key (RS256)
    pub fn new_rs256(public_key_pem: &str) -> Result<Self, AuthError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| AuthError::Misconfigured(e.to_string()))?;
        Ok(Self {
            decoding_key,
            validation: validation_for(Algorithm::RS256),
        })
    }

    /// Create a new JWT authenticator with a P-256 EC public key (ES256)
    pub fn new_es256(public_key_pem: &str) -> Result<Self, AuthError> {
        let decoding_key = DecodingKey::from_ec_pem(public_key_pem.as_bytes())
            .map_err(|e| AuthError::Misconfigured(e.to_string()))?;
        Ok(Self {
            decoding_key,
            validation: validation_for(Algorithm::ES256),
        })
    }

    /// Require the `iss` claim
    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Require the `aud` claim
    #[must_use]
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }

    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken(e.to_string()),
            },
        )?;

        if token_data.claims.sub.is_empty() {
            return Err(AuthError::InvalidToken("empty subject".into()));
        }
        // The subject is the first key segment; a '/' would reach into another owner's prefix
        if token_data.claims.sub.contains('/') {
            return Err(AuthError::InvalidToken("subject contains '/'".into()));
        }

        let mut claims = HashMap::new();
        if let Some(iss) = token_data.claims.iss {
            claims.insert("iss".into(), serde_json::Value::String(iss));
        }
        if let Some(aud) = token_data.claims.aud {
            claims.insert("aud".into(), serde_json::Value::String(aud));
        }

        Ok(Identity {
            user_id: UserId::new(token_data.claims.sub),
            claims,
        })
    }
}

/// Pull a bearer token from the `Authorization` header or a `token` query parameter
pub fn extract_token(request: &AuthRequest) -> Option<String> {
    if let Some(auth) = request.headers.get("authorization") {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    request.query.as_deref().and_then(|query| {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
            .map(str::to_string)
    })
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let token = extract_token(request).ok_or(AuthError::MissingAuth)?;
        let result = self.verify(&token);
        metrics::record_auth_attempt("jwt", result.is_ok());
        result
    }

    fn method(&self) -> &'static str {
        "jwt"
    }
}

/// HS256 authenticator whose secret lives in the [`SecretStore`].
///
/// The secret is looked up on every request, so invalidating the store after
/// a rotation takes effect without a restart.
pub struct SecretStoreJwtAuthenticator {
    secrets: Arc<SecretStore>,
    secret_name: String,
    issuer: Option<String>,
    audience: Option<String>,
}

impl SecretStoreJwtAuthenticator {
    pub fn new(secrets: Arc<SecretStore>, secret_name: &str) -> Self {
        Self {
            secrets,
            secret_name: secret_name.to_string(),
            issuer: None,
            audience: None,
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.issuer = Some(issuer.to_string());
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.audience = Some(audience.to_string());
        self
    }
}

#[async_trait]
impl Authenticator for SecretStoreJwtAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let token = extract_token(request).ok_or(AuthError::MissingAuth)?;

        let secret = self.secrets.get_one(&self.secret_name).await;
        if secret.is_empty() {
            metrics::record_auth_attempt("jwt", false);
            return Err(AuthError::Misconfigured(format!(
                "secret {} is empty",
                self.secret_name
            )));
        }

        let mut inner = JwtAuthenticator::new_hs256(&secret);
        if let Some(issuer) = &self.issuer {
            inner = inner.with_issuer(issuer);
        }
        if let Some(audience) = &self.audience {
            inner = inner.with_audience(audience);
        }

        let result = inner.verify(&token);
        metrics::record_auth_attempt("jwt", result.is_ok());
        result
    }

    fn method(&self) -> &'static str {
        "jwt"
    }
}

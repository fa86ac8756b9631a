//! Secret store
//!
//! Process-lifetime cache of secret name/value pairs. The first read fetches
//! from the secrets service (when enabled) and falls back to the process
//! environment if that fails. The snapshot then stays cached until
//! [`SecretStore::invalidate`] is called; there is no TTL.
//!
//! # Concurrency
//!
//! The cache lock is held only to read or swap the snapshot pointer, never
//! across a fetch. Concurrent cold reads may each fetch; the last writer wins.
//! Readers always receive a whole [`SecretMap`], never a partial one.
//!
//! Every [`SecretStore::invalidate`] bumps a generation counter. A fetch that
//! started under an older generation still returns its snapshot to its own
//! caller but does not cache it, so an invalidation is never undone.
//!
//! # Example
//!
//! ```no_run
//! use docvault_gateway::secrets::SecretStore;
//!
//! # async fn example() {
//! let store = SecretStore::disabled();
//! let key = store.get_one("GEMINI_API_KEY").await;
//! store.invalidate();
//! # let _ = key;
//! # }
//! ```

use crate::clock::{Clock, SystemClock};
use crate::metrics;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod aws;

pub use aws::AwsSecretsSource;

/// Secrets read from the environment when the service is disabled or fails
pub const FALLBACK_SECRET_NAMES: [&str; 5] = [
    "CLERK_SECRET_KEY",
    "HUME_API_KEY",
    "HUME_SECRET_KEY",
    "GEMINI_API_KEY",
    "ARCJET_KEY",
];

/// Errors from a secrets source. Never surfaced to callers of the store.
#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Secrets service request failed: {0}")]
    Fetch(String),

    #[error("Secret payload is not a JSON object: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Primary secrets service
#[async_trait]
pub trait SecretsSource: Send + Sync {
    /// Fetch the raw secret document (a JSON object keyed by secret name)
    async fn fetch(&self) -> Result<String, SecretsError>;
}

/// Read access to environment variables
pub trait EnvSource: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Where a snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretOrigin {
    Service,
    Environment,
}

impl SecretOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretOrigin::Service => "service",
            SecretOrigin::Environment => "environment",
        }
    }
}

/// Immutable snapshot of all secrets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMap {
    values: HashMap<String, String>,
    origin: SecretOrigin,
    degraded: bool,
    loaded_at_millis: i64,
}

impl SecretMap {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn values(&self) -> &HashMap<String, String> {
        &self.values
    }

    pub fn origin(&self) -> SecretOrigin {
        self.origin
    }

    /// True when the service was enabled but the environment fallback was used
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn loaded_at_millis(&self) -> i64 {
        self.loaded_at_millis
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parse the service's JSON document. Non-string values keep their JSON text.
fn parse_secret_document(raw: &str) -> Result<HashMap<String, String>, SecretsError> {
    let document: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)?;
    Ok(document
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (name, value)
        })
        .collect())
}

#[derive(Default)]
struct CacheSlot {
    generation: u64,
    snapshot: Option<Arc<SecretMap>>,
}

/// Cached secret store, shared by handle
pub struct SecretStore {
    source: Option<Arc<dyn SecretsSource>>,
    env: Arc<dyn EnvSource>,
    clock: Arc<dyn Clock>,
    cache: RwLock<CacheSlot>,
}

impl SecretStore {
    /// Create a store. `source` is `None` when the secrets service is disabled.
    pub fn new(
        source: Option<Arc<dyn SecretsSource>>,
        env: Arc<dyn EnvSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            env,
            clock,
            cache: RwLock::new(CacheSlot::default()),
        }
    }

    /// Store backed only by the process environment
    pub fn disabled() -> Self {
        Self::new(None, Arc::new(ProcessEnv), Arc::new(SystemClock))
    }

    /// All secrets. Never fails; falls back to the environment.
    pub async fn get_all(&self) -> Arc<SecretMap> {
        let generation = {
            let slot = self.cache.read();
            if let Some(cached) = &slot.snapshot {
                return Arc::clone(cached);
            }
            slot.generation
        };

        let snapshot = Arc::new(self.load().await);

        let mut slot = self.cache.write();
        if slot.generation == generation {
            slot.snapshot = Some(Arc::clone(&snapshot));
        } else {
            tracing::debug!("Secret cache invalidated during load, snapshot not cached");
        }
        snapshot
    }

    /// One secret, or an empty string when absent
    pub async fn get_one(&self, name: &str) -> String {
        self.get_all()
            .await
            .get(name)
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Drop the cached snapshot; the next read fetches again
    pub fn invalidate(&self) {
        {
            let mut slot = self.cache.write();
            slot.generation += 1;
            slot.snapshot = None;
        }
        tracing::info!("Secret cache invalidated");
    }

    /// Whether a snapshot is currently cached
    pub fn is_cached(&self) -> bool {
        self.cache.read().snapshot.is_some()
    }

    async fn load(&self) -> SecretMap {
        let loaded_at_millis = self.clock.now_millis();

        if let Some(source) = &self.source {
            let fetched = source
                .fetch()
                .await
                .and_then(|raw| parse_secret_document(&raw));

            match fetched {
                Ok(values) => {
                    tracing::info!(count = values.len(), "Loaded secrets from secrets service");
                    metrics::record_secrets_load(SecretOrigin::Service.as_str());
                    return SecretMap {
                        values,
                        origin: SecretOrigin::Service,
                        degraded: false,
                        loaded_at_millis,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Secrets service failed, using environment fallback"
                    );
                    metrics::record_error("secrets_degraded");
                }
            }
        }

        metrics::record_secrets_load(SecretOrigin::Environment.as_str());
        SecretMap {
            values: self.environment_fallback(),
            origin: SecretOrigin::Environment,
            degraded: self.source.is_some(),
            loaded_at_millis,
        }
    }

    fn environment_fallback(&self) -> HashMap<String, String> {
        FALLBACK_SECRET_NAMES
            .iter()
            .map(|name| (name.to_string(), self.env.var(name).unwrap_or_default()))
            .collect()
    }
}

//! HTTP server module
//!
//! hyper HTTP/1.1 server exposing the upload API. One task per connection;
//! shared state lives in [`AppState`] behind an `Arc`.
//!
//! # Example
//!
//! ```no_run
//! use docvault_gateway::config::Config;
//! use docvault_gateway::server::{AppState, Server};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.yaml")?;
//! let state = Arc::new(AppState::from_config(&config).await?);
//! let server = Server::bind(&config.server.address, state).await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await;
//! # Ok(())
//! # }
//! ```

use crate::auth::{build_authenticator, AuthError, Authenticator};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::s3::{load_sdk_config, s3_client, S3Storage};
use crate::secrets::{AwsSecretsSource, ProcessEnv, SecretStore, SecretsSource};
use crate::upload::UploadGateway;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

mod handlers;
pub mod multipart;
pub mod query;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Authentication setup failed: {0}")]
    Auth(#[from] AuthError),
}

/// State shared by every request
pub struct AppState {
    pub gateway: UploadGateway,
    pub authenticator: Arc<dyn Authenticator>,
    pub secrets: Arc<SecretStore>,
    /// Cap on a buffered request body
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(
        gateway: UploadGateway,
        authenticator: Arc<dyn Authenticator>,
        secrets: Arc<SecretStore>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            gateway,
            authenticator,
            secrets,
            max_body_bytes,
        }
    }

    /// Wire the AWS clients, secret store and authenticator from configuration
    pub async fn from_config(config: &Config) -> Result<Self, ServerError> {
        let sdk_config = load_sdk_config(&config.aws).await;
        let storage = S3Storage::new(s3_client(&sdk_config, &config.aws));

        let source: Option<Arc<dyn SecretsSource>> = if config.secrets.use_secrets_service {
            info!(secret_id = %config.secrets.secret_id, "Secrets service enabled");
            Some(Arc::new(AwsSecretsSource::from_sdk_config(
                &sdk_config,
                &config.secrets.secret_id,
            )))
        } else {
            info!("Secrets service disabled, reading secrets from environment");
            None
        };
        let secrets = Arc::new(SecretStore::new(
            source,
            Arc::new(ProcessEnv),
            Arc::new(SystemClock),
        ));

        let authenticator = build_authenticator(&config.auth, Arc::clone(&secrets))?;
        let gateway = UploadGateway::new(Arc::new(storage), Arc::new(SystemClock));

        Ok(Self::new(
            gateway,
            authenticator,
            secrets,
            config.server.max_body_bytes,
        ))
    }
}

/// HTTP Server
pub struct Server {
    state: Arc<AppState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind immediately; port 0 lets the OS pick
    pub async fn bind(address: &str, state: Arc<AppState>) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address {}: {}", address, e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        Ok(Self {
            state,
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections forever
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves. In-flight connections
    /// finish on their own tasks.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!("Starting server on {}", self.local_addr);
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service =
                    service_fn(move |req| handlers::handle_request(req, Arc::clone(&state)));

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }

        info!("Server stopped accepting connections");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FixedIdentityAuthenticator;
    use crate::s3::MockObjectStore;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            UploadGateway::new(Arc::new(MockObjectStore::new()), Arc::new(SystemClock)),
            Arc::new(FixedIdentityAuthenticator::new("user-1")),
            Arc::new(SecretStore::disabled()),
            1024,
        ))
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = Server::bind("127.0.0.1:0", test_state()).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_invalid_address() {
        let result = Server::bind("invalid", test_state()).await;
        assert!(matches!(result, Err(ServerError::BindError(_))));
    }

    #[tokio::test]
    async fn test_run_until_stops() {
        let server = Server::bind("127.0.0.1:0", test_state()).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), server.run_until(async {}))
            .await
            .unwrap();
    }
}

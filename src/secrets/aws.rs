//! AWS Secrets Manager source

use super::{SecretsError, SecretsSource};
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;

/// Reads one secret whose value is a JSON object of name/value pairs
#[derive(Clone)]
pub struct AwsSecretsSource {
    client: Client,
    secret_id: String,
}

impl AwsSecretsSource {
    pub fn new(client: Client, secret_id: impl Into<String>) -> Self {
        Self {
            client,
            secret_id: secret_id.into(),
        }
    }

    /// Build from a shared SDK configuration
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, secret_id: &str) -> Self {
        Self::new(Client::new(sdk_config), secret_id)
    }

    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }
}

#[async_trait]
impl SecretsSource for AwsSecretsSource {
    #[tracing::instrument(
        name = "secrets.get_secret_value",
        skip(self),
        fields(secrets.id = %self.secret_id),
        err
    )]
    async fn fetch(&self) -> Result<String, SecretsError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(&self.secret_id)
            .send()
            .await
            .map_err(|e| SecretsError::Fetch(DisplayErrorContext(&e).to_string()))?;

        // A binary-only secret has no string form; treat it as empty.
        Ok(output.secret_string().unwrap_or("{}").to_string())
    }
}

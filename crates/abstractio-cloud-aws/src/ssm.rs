//! SSM Parameter Store secrets

use abstractio_cloud::{CloudError, Result, SecretSource};
use async_trait::async_trait;
use aws_sdk_ssm::Client;
use aws_sdk_ssm::error::DisplayErrorContext;

/// Reads (decrypted) parameters from SSM Parameter Store
#[derive(Debug, Clone)]
pub struct Ssm {
    client: Client,
}

impl Ssm {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretSource for Ssm {
    async fn get_secret(&self, name: &str) -> Result<String> {
        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_parameter_not_found()) {
                    tracing::warn!(name, "Parameter not found");
                    return CloudError::SecretNotFound(name.to_string());
                }
                let message = DisplayErrorContext(&e).to_string();
                tracing::error!(name, error = %message, "Error while getting SSM parameter");
                CloudError::Store(message)
            })?;

        output
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| {
                tracing::warn!(name, "Parameter has no value");
                CloudError::SecretNotFound(name.to_string())
            })
    }
}

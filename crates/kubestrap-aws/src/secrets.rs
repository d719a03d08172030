//! Secret values (Secrets Manager)

use async_trait::async_trait;

use crate::error::{CloudError, Result};

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Store a new current value for an existing secret
    async fn put_secret_value(&self, secret_id: &str, value: &str) -> Result<()>;

    /// Create a secret with an initial value
    async fn create_secret(&self, name: &str, value: &str) -> Result<()>;

    /// Read the current string value of a secret
    async fn get_secret_string(&self, secret_id: &str) -> Result<String>;
}

pub struct AwsSecrets {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecrets {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_secretsmanager::Client::new(config),
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecrets {
    async fn put_secret_value(&self, secret_id: &str, value: &str) -> Result<()> {
        self.client
            .put_secret_value()
            .secret_id(secret_id)
            .secret_string(value)
            .send()
            .await
            .map_err(CloudError::from_sdk)?;
        Ok(())
    }

    async fn create_secret(&self, name: &str, value: &str) -> Result<()> {
        self.client
            .create_secret()
            .name(name)
            .secret_string(value)
            .send()
            .await
            .map_err(CloudError::from_sdk)?;
        Ok(())
    }

    async fn get_secret_string(&self, secret_id: &str) -> Result<String> {
        let response = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(CloudError::from_sdk)?;

        response
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| CloudError::InvalidRequest(format!("secret '{}' has no string value", secret_id)))
    }
}

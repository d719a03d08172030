//! Container registry (ECR)

use async_trait::async_trait;

use crate::error::{CloudError, Result};

/// Short-lived registry login material
///
/// `token` is base64 of `user:password`; it is never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryToken {
    pub token: String,
    /// Registry endpoint the token is valid for (e.g. `https://1234.dkr.ecr.eu-west-1.amazonaws.com`)
    pub endpoint: String,
}

impl std::fmt::Debug for RegistryToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryToken")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[async_trait]
pub trait ContainerRegistry: Send + Sync {
    /// Repository URI, or `None` when no repository has that name
    async fn repository_uri(&self, name: &str) -> Result<Option<String>>;

    /// Create a repository and return its URI
    async fn create_repository(&self, name: &str) -> Result<String>;

    /// Fetch a fresh login token
    async fn authorization_token(&self) -> Result<RegistryToken>;
}

pub struct AwsRegistry {
    client: aws_sdk_ecr::Client,
}

impl AwsRegistry {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ecr::Client::new(config),
        }
    }
}

#[async_trait]
impl ContainerRegistry for AwsRegistry {
    async fn repository_uri(&self, name: &str) -> Result<Option<String>> {
        let response = match self
            .client
            .describe_repositories()
            .repository_names(name)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let err = CloudError::from_sdk(err);
                if err.is_not_found() {
                    return Ok(None);
                }
                return Err(err);
            }
        };

        Ok(response
            .repositories()
            .iter()
            .find(|repo| repo.repository_name() == Some(name))
            .and_then(|repo| repo.repository_uri())
            .map(str::to_string))
    }

    async fn create_repository(&self, name: &str) -> Result<String> {
        let response = self
            .client
            .create_repository()
            .repository_name(name)
            .send()
            .await
            .map_err(CloudError::from_sdk)?;

        response
            .repository()
            .and_then(|repo| repo.repository_uri())
            .map(str::to_string)
            .ok_or_else(|| CloudError::Other(format!("created repository '{}' has no URI", name)))
    }

    async fn authorization_token(&self) -> Result<RegistryToken> {
        let response = self
            .client
            .get_authorization_token()
            .send()
            .await
            .map_err(CloudError::from_sdk)?;

        let data = response
            .authorization_data()
            .first()
            .ok_or_else(|| CloudError::Other("registry returned no authorization data".to_string()))?;

        match (data.authorization_token(), data.proxy_endpoint()) {
            (Some(token), Some(endpoint)) => Ok(RegistryToken {
                token: token.to_string(),
                endpoint: endpoint.to_string(),
            }),
            _ => Err(CloudError::Other(
                "registry authorization data is incomplete".to_string(),
            )),
        }
    }
}

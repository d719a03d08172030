//! Caller identity (STS)

use async_trait::async_trait;

use crate::error::{CloudError, Result};

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Account id of the authenticated caller
    async fn caller_account(&self) -> Result<String>;
}

pub struct AwsIdentity {
    client: aws_sdk_sts::Client,
}

impl AwsIdentity {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(config),
        }
    }
}

#[async_trait]
impl IdentityService for AwsIdentity {
    async fn caller_account(&self) -> Result<String> {
        let response = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(CloudError::from_sdk)?;

        response
            .account()
            .filter(|account| !account.is_empty())
            .map(str::to_string)
            .ok_or_else(|| CloudError::Other("caller identity response carried no account".to_string()))
    }
}

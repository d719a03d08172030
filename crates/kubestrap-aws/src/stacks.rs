//! Stack submission (CloudFormation)

use async_trait::async_trait;
use aws_sdk_cloudformation::types::{Capability, Parameter};

use crate::error::{CloudError, Result};

/// Everything needed to create a stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    pub stack_name: String,
    pub template_url: String,
    /// Ordered (key, value) pairs
    pub parameters: Vec<(String, String)>,
    pub capabilities: Vec<String>,
}

#[async_trait]
pub trait StackService: Send + Sync {
    /// Submit stack creation and return the stack id once accepted
    async fn create_stack(&self, request: &StackRequest) -> Result<String>;
}

pub struct AwsStacks {
    client: aws_sdk_cloudformation::Client,
}

impl AwsStacks {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudformation::Client::new(config),
        }
    }
}

#[async_trait]
impl StackService for AwsStacks {
    async fn create_stack(&self, request: &StackRequest) -> Result<String> {
        let parameters = request
            .parameters
            .iter()
            .map(|(key, value)| {
                Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value)
                    .build()
            })
            .collect::<Vec<_>>();

        let capabilities = request
            .capabilities
            .iter()
            .map(|c| Capability::from(c.as_str()))
            .collect::<Vec<_>>();

        let response = self
            .client
            .create_stack()
            .stack_name(&request.stack_name)
            .template_url(&request.template_url)
            .set_parameters(Some(parameters))
            .set_capabilities(Some(capabilities))
            .send()
            .await
            .map_err(CloudError::from_sdk)?;

        Ok(response
            .stack_id()
            .map(str::to_string)
            .unwrap_or_else(|| request.stack_name.clone()))
    }
}

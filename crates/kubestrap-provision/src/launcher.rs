//! Stack submission

use std::sync::Arc;

use kubestrap_aws::StackService;

use crate::error::{ProvisionError, ProvisionErrorKind, Result};
use crate::parameters::{ComposedStack, validate_capabilities};

pub struct StackLauncher {
    stacks: Arc<dyn StackService>,
}

impl StackLauncher {
    pub fn new(stacks: Arc<dyn StackService>) -> Self {
        Self { stacks }
    }

    /// Submit stack creation and return the stack id
    ///
    /// Returns as soon as the request is accepted; completion is not awaited.
    /// A rejected submission is never retried.
    pub async fn launch(&self, stack: &ComposedStack) -> Result<String> {
        validate_capabilities(&stack.capabilities)?;

        let request = stack.to_request();
        let stack_id = self.stacks.create_stack(&request).await.map_err(|e| {
            tracing::error!(
                stack = %request.stack_name,
                template = %request.template_url,
                error = %e,
                "stack submission rejected"
            );
            let message = if e.is_already_exists() {
                format!("stack '{}' already exists", request.stack_name)
            } else {
                format!("cannot create stack '{}'", request.stack_name)
            };
            ProvisionError::new(ProvisionErrorKind::StackSubmissionFailure, message).with_source(e)
        })?;

        tracing::info!(stack = %request.stack_name, stack_id = %stack_id, "stack creation submitted");
        Ok(stack_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::StackParameter;
    use kubestrap_aws::mock::MockOp;
    use kubestrap_aws::{CloudError, MockCloud};

    fn stack(capabilities: &[&str]) -> ComposedStack {
        ComposedStack {
            stack_name: "k8s-dev".to_string(),
            template_url: "https://s3.amazonaws.com/b/templates/main.yaml".to_string(),
            parameters: vec![StackParameter::new("ProjectName", "k8s")],
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_launch_returns_stack_id() {
        let cloud = MockCloud::new();
        let id = StackLauncher::new(Arc::new(cloud.clone()))
            .launch(&stack(&["CAPABILITY_IAM"]))
            .await
            .unwrap();

        assert!(id.contains("stack/k8s-dev/"));
        let submitted = &cloud.stacks()[0];
        assert_eq!(submitted.parameters, vec![("ProjectName".to_string(), "k8s".to_string())]);
        assert_eq!(submitted.capabilities, vec!["CAPABILITY_IAM"]);
    }

    #[tokio::test]
    async fn test_bad_capability_never_submits() {
        let cloud = MockCloud::new();
        let err = StackLauncher::new(Arc::new(cloud.clone()))
            .launch(&stack(&["CAPABILITY_IAM", "CAPABILITY_EVERYTHING"]))
            .await
            .unwrap_err();

        assert!(err.is(ProvisionErrorKind::InvalidCapabilities));
        assert_eq!(cloud.operation_counts().create_stack, 0);
    }

    #[tokio::test]
    async fn test_duplicate_stack_is_fatal() {
        let cloud = MockCloud::new();
        let launcher = StackLauncher::new(Arc::new(cloud.clone()));
        launcher.launch(&stack(&[])).await.unwrap();

        let err = launcher.launch(&stack(&[])).await.unwrap_err();
        assert!(err.is(ProvisionErrorKind::StackSubmissionFailure));
        assert!(err.message.contains("already exists"));
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let cloud = MockCloud::new();
        cloud.fail(
            MockOp::CreateStack,
            CloudError::InvalidParameter("TemplateURL must reference a valid S3 object".into()),
        );

        let err = StackLauncher::new(Arc::new(cloud.clone()))
            .launch(&stack(&[]))
            .await
            .unwrap_err();

        assert!(err.is(ProvisionErrorKind::StackSubmissionFailure));
        assert_eq!(cloud.operation_counts().create_stack, 1);
    }
}

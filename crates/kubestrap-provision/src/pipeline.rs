//! Sequential deployment pipeline

use std::path::PathBuf;

use kubestrap_core::naming::{
    IMAGE_TAG, PUBLIC_KEY_OBJECT_KEY, ResourceNames, SCRIPTS_PREFIX, TEMPLATES_PREFIX,
};
use tracing::Instrument;

use crate::artifacts::ArtifactPublisher;
use crate::context::RunContext;
use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::image::{ContainerEngine, ImagePublisher, ImageReference};
use crate::keys::{KeyProvisioner, default_key_dir};
use crate::launcher::StackLauncher;
use crate::parameters::{DynamicValues, ParameterComposer, validate_capabilities};
use crate::secrets::{SecretProvisioner, generate_password};

/// What a successful run provisioned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    pub account_id: String,
    pub region: String,
    pub public_key: PathBuf,
    pub key_reused: bool,
    pub artifact_bucket: String,
    pub uploaded_objects: usize,
    pub image: ImageReference,
    pub secret_id: String,
    pub stack_name: String,
    pub stack_id: String,
}

pub struct Deployment {
    ctx: RunContext,
}

impl Deployment {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    /// Run every step once, in order; the first failure aborts the run
    pub async fn run(&self) -> Result<DeploymentReport> {
        let span = self.ctx.span.clone();
        self.run_steps().instrument(span).await
    }

    async fn run_steps(&self) -> Result<DeploymentReport> {
        let config = &self.ctx.config;
        let services = &self.ctx.services;

        // nothing is created when the stack could never be submitted
        validate_capabilities(&config.cloudformation.capabilities)?;

        let identity = IdentityResolver::new(services.identity.clone())
            .resolve(config.region())
            .await?;

        let names = ResourceNames::new(
            config.project_name(),
            config.environment_name(),
            &identity.region,
            &identity.account_id,
        )?;

        let key_dir = config
            .artifacts
            .key_dir
            .clone()
            .unwrap_or_else(default_key_dir);
        let keys = KeyProvisioner::new(self.ctx.runner.clone(), key_dir)
            .generate(&names.key_name)
            .await?;

        let artifacts = ArtifactPublisher::new(services.objects.clone());
        artifacts
            .ensure_bucket(&names.artifact_bucket, &identity.region)
            .await?;
        artifacts
            .upload_file(&names.artifact_bucket, &keys.public_key, PUBLIC_KEY_OBJECT_KEY)
            .await?;
        let scripts = artifacts
            .upload_tree(&names.artifact_bucket, &config.artifacts.scripts_dir, SCRIPTS_PREFIX)
            .await?;
        let templates = artifacts
            .upload_tree(
                &names.artifact_bucket,
                &config.artifacts.templates_dir,
                TEMPLATES_PREFIX,
            )
            .await?;

        let image = ImagePublisher::new(
            services.registry.clone(),
            ContainerEngine::new(self.ctx.runner.clone()),
        )
        .publish(&config.artifacts.image_context, &names.image_repository, IMAGE_TAG)
        .await?;

        let secret_id = config.admin_password_secret_id();
        SecretProvisioner::new(services.secrets.clone())
            .put_secret(&secret_id, &generate_password())
            .await?;

        let stack = ParameterComposer::compose(
            config,
            &DynamicValues {
                artifact_bucket: names.artifact_bucket.clone(),
                cache_bucket: names.cache_bucket.clone(),
                account_id: identity.account_id.clone(),
                region: identity.region.clone(),
                image_uri: image.to_string(),
            },
        )?;
        let stack_id = StackLauncher::new(services.stacks.clone())
            .launch(&stack)
            .await?;

        Ok(DeploymentReport {
            account_id: identity.account_id,
            region: identity.region,
            public_key: keys.public_key,
            key_reused: keys.reused,
            artifact_bucket: names.artifact_bucket,
            uploaded_objects: 1 + scripts.len() + templates.len(),
            image,
            secret_id,
            stack_name: stack.stack_name,
            stack_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Services;
    use crate::error::ProvisionErrorKind;
    use kubestrap_aws::mock::MockOp;
    use kubestrap_aws::{CloudError, MockCloud};
    use kubestrap_core::{CommandOutput, DeploymentConfig, MockCommandRunner};
    use std::path::Path;
    use std::sync::Arc;

    struct Workspace {
        _dir: tempfile::TempDir,
        config: DeploymentConfig,
    }

    fn workspace(region: &str) -> Workspace {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for (path, body) in [
            ("scripts/bootstrap.sh", "#!/bin/sh"),
            ("scripts/nodes/master.sh", "master"),
            ("templates/main.yaml", "Resources: {}"),
            ("lambda/dbbootstrap/Dockerfile", "FROM scratch"),
        ] {
            let path = root.join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }

        let mut config =
            DeploymentConfig::load(None, &[format!("project.environment.region={}", region)])
                .unwrap();
        config.artifacts.scripts_dir = root.join("scripts");
        config.artifacts.templates_dir = root.join("templates");
        config.artifacts.image_context = root.join("lambda/dbbootstrap");
        config.artifacts.key_dir = Some(root.join("ssh"));

        Workspace { _dir: dir, config }
    }

    fn runner() -> MockCommandRunner {
        let runner = MockCommandRunner::new();
        runner.respond_with(
            |spec| spec.program == "ssh-keygen",
            |spec| {
                let path = spec
                    .args
                    .iter()
                    .skip_while(|a| a.as_str() != "-f")
                    .nth(1)
                    .unwrap();
                std::fs::write(path, "PRIVATE").unwrap();
                std::fs::write(format!("{}.pub", path), "ssh-rsa AAAA k8s-dev").unwrap();
                CommandOutput::success("")
            },
        );
        runner.respond(
            |spec| spec.args.first().map(String::as_str) == Some("image"),
            CommandOutput::failure(1, "No such image"),
        );
        runner
    }

    fn deployment(ws: &Workspace, cloud: &MockCloud, runner: &MockCommandRunner) -> Deployment {
        Deployment::new(RunContext::new(
            ws.config.clone(),
            Services::mock(cloud),
            Arc::new(runner.clone()),
        ))
    }

    #[tokio::test]
    async fn test_full_run() {
        let ws = workspace("us-east-1");
        let cloud = MockCloud::new();
        let runner = runner();

        let report = deployment(&ws, &cloud, &runner).run().await.unwrap();

        let bucket = "k8s-k8s-dev-us-east-1-123456789012";
        assert_eq!(report.artifact_bucket, bucket);
        assert_eq!(report.uploaded_objects, 4);
        assert_eq!(
            cloud.object_keys(bucket),
            vec![
                "scripts/bootstrap.sh",
                "scripts/nodes/master.sh",
                "ssh/client-key.pub",
                "templates/main.yaml",
            ]
        );
        assert_eq!(cloud.bucket_requests(), vec![(bucket.to_string(), None)]);

        let password = cloud.secret("k8s/dev/keycloak/admin-password").unwrap();
        assert_eq!(password.len(), 32);

        let stacks = cloud.stacks();
        assert_eq!(stacks.len(), 1);
        assert_eq!(stacks[0].stack_name, "k8s-dev");
        assert_eq!(
            stacks[0].template_url,
            format!("https://s3.amazonaws.com/{}/templates/main.yaml", bucket)
        );
        assert!(
            stacks[0]
                .parameters
                .iter()
                .any(|(k, v)| k == "DBBootstrapImageUri" && v == &report.image.to_string())
        );
        assert!(!stacks[0].parameters.iter().any(|(_, v)| v == &password));
        assert!(report.stack_id.contains("k8s-dev"));
    }

    #[tokio::test]
    async fn test_non_default_region_uses_location_constraint() {
        let ws = workspace("eu-west-1");
        let cloud = MockCloud::new();

        let report = deployment(&ws, &cloud, &runner()).run().await.unwrap();

        assert_eq!(report.region, "eu-west-1");
        assert_eq!(
            cloud.bucket_requests(),
            vec![(
                "k8s-k8s-dev-eu-west-1-123456789012".to_string(),
                Some("eu-west-1".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn test_second_run_reuses_resources() {
        let ws = workspace("us-east-1");
        let cloud = MockCloud::new();
        let runner = runner();
        deployment(&ws, &cloud, &runner).run().await.unwrap();

        // the stack exists now; everything before it must still be idempotent
        let err = deployment(&ws, &cloud, &runner).run().await.unwrap_err();

        assert!(err.is(ProvisionErrorKind::StackSubmissionFailure));
        assert_eq!(cloud.operation_counts().create_repository, 1);
        assert_eq!(cloud.operation_counts().create_secret, 1);
        assert_eq!(
            runner
                .calls()
                .iter()
                .filter(|c| c.program == "ssh-keygen")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_invalid_capabilities_touch_nothing() {
        let mut ws = workspace("us-east-1");
        ws.config
            .cloudformation
            .capabilities
            .push("CAPABILITY_UNSAFE".to_string());
        let cloud = MockCloud::new();
        let runner = runner();

        let err = deployment(&ws, &cloud, &runner).run().await.unwrap_err();

        assert!(err.is(ProvisionErrorKind::InvalidCapabilities));
        assert_eq!(cloud.operation_counts().total(), 0);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_identity_failure_stops_before_keys() {
        let ws = workspace("us-east-1");
        let cloud = MockCloud::new().without_credentials();
        let runner = runner();

        let err = deployment(&ws, &cloud, &runner).run().await.unwrap_err();

        assert!(err.is(ProvisionErrorKind::IdentityUnavailable));
        assert!(runner.calls().is_empty());
        assert_eq!(cloud.operation_counts().create_bucket, 0);
    }

    #[tokio::test]
    async fn test_upload_failure_stops_pipeline() {
        let ws = workspace("us-east-1");
        let cloud = MockCloud::new();
        cloud.fail_object_key("templates/main.yaml", CloudError::Other("AccessDenied".into()));
        let runner = runner();

        let err = deployment(&ws, &cloud, &runner).run().await.unwrap_err();

        assert!(err.is(ProvisionErrorKind::ArtifactPublishFailure));
        assert!(runner.calls_with_first_arg("build").is_empty());
        assert_eq!(cloud.operation_counts().put_secret_value, 0);
        assert!(cloud.stacks().is_empty());
    }

    #[tokio::test]
    async fn test_secret_failure_prevents_launch() {
        let ws = workspace("us-east-1");
        let cloud = MockCloud::new();
        cloud.fail(MockOp::PutSecretValue, CloudError::InternalService("boom".into()));

        let err = deployment(&ws, &cloud, &runner()).run().await.unwrap_err();

        assert!(err.is(ProvisionErrorKind::SecretWriteFailure));
        assert_eq!(cloud.operation_counts().create_stack, 0);
    }

    #[tokio::test]
    async fn test_missing_scripts_dir() {
        let mut ws = workspace("us-east-1");
        ws.config.artifacts.scripts_dir = Path::new("/nonexistent/scripts").to_path_buf();

        let err = deployment(&ws, &MockCloud::new(), &runner())
            .run()
            .await
            .unwrap_err();
        assert!(err.is(ProvisionErrorKind::ArtifactPublishFailure));
    }
}

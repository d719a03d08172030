//! Per-run context
//!
//! One [`RunContext`] is built at the start of a run and threaded through
//! every component: the resolved configuration, the cloud service handles,
//! the process runner and the run's tracing span.

use std::sync::Arc;

use kubestrap_aws::{
    AwsIdentity, AwsObjectStore, AwsRegistry, AwsSecrets, AwsStacks, ContainerRegistry,
    IdentityService, MockCloud, ObjectStore, SecretStore, StackService, load_sdk_config,
};
use kubestrap_core::{CommandRunner, DeploymentConfig, SystemCommandRunner};

/// Cloud service handles shared by the components of one run
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityService>,
    pub objects: Arc<dyn ObjectStore>,
    pub registry: Arc<dyn ContainerRegistry>,
    pub secrets: Arc<dyn SecretStore>,
    pub stacks: Arc<dyn StackService>,
}

impl Services {
    /// AWS clients for the configured region
    pub async fn aws(region: &str) -> Self {
        let sdk = load_sdk_config(Some(region)).await;
        Self {
            identity: Arc::new(AwsIdentity::new(&sdk)),
            objects: Arc::new(AwsObjectStore::new(&sdk)),
            registry: Arc::new(AwsRegistry::new(&sdk)),
            secrets: Arc::new(AwsSecrets::new(&sdk)),
            stacks: Arc::new(AwsStacks::new(&sdk)),
        }
    }

    /// Every service backed by the same in-memory cloud
    pub fn mock(cloud: &MockCloud) -> Self {
        Self {
            identity: Arc::new(cloud.clone()),
            objects: Arc::new(cloud.clone()),
            registry: Arc::new(cloud.clone()),
            secrets: Arc::new(cloud.clone()),
            stacks: Arc::new(cloud.clone()),
        }
    }
}

pub struct RunContext {
    pub config: DeploymentConfig,
    pub services: Services,
    pub runner: Arc<dyn CommandRunner>,
    pub span: tracing::Span,
}

impl RunContext {
    pub fn new(config: DeploymentConfig, services: Services, runner: Arc<dyn CommandRunner>) -> Self {
        let span = tracing::info_span!(
            "deploy",
            project = %config.project_name(),
            environment = %config.environment_name(),
            region = %config.region(),
        );
        Self {
            config,
            services,
            runner,
            span,
        }
    }

    /// Context talking to AWS and spawning real processes
    pub async fn aws(config: DeploymentConfig) -> Self {
        let services = Services::aws(config.region()).await;
        Self::new(config, services, Arc::new(SystemCommandRunner))
    }
}

//! Cloud service seams
//!
//! Every cloud API kubestrap calls sits behind a narrow trait:
//!
//! - [`IdentityService`]: who is calling (STS)
//! - [`ObjectStore`]: buckets and objects (S3)
//! - [`ContainerRegistry`]: image repositories and login tokens (ECR)
//! - [`SecretStore`]: secret values (Secrets Manager)
//! - [`StackService`]: stack submission (CloudFormation)
//!
//! The `Aws*` types implement them with the AWS SDK and translate provider
//! errors into [`CloudError`]. [`MockCloud`] implements all of them in
//! memory for tests.

pub mod error;
pub mod identity;
pub mod mock;
pub mod registry;
pub mod sdk;
pub mod secrets;
pub mod stacks;
pub mod storage;

pub use error::{CloudError, Result};
pub use identity::{AwsIdentity, IdentityService};
pub use mock::{MockCloud, OperationCounts};
pub use registry::{AwsRegistry, ContainerRegistry, RegistryToken};
pub use sdk::load_sdk_config;
pub use secrets::{AwsSecrets, SecretStore};
pub use stacks::{AwsStacks, StackRequest, StackService};
pub use storage::{AwsObjectStore, ObjectStore};

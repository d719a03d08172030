//! kubestrap provisioning pipeline
//!
//! The CLI-time half of kubestrap. Each component does one idempotent step
//! and fails with a [`ProvisionError`] whose kind names the step:
//!
//! 1. [`IdentityResolver`] - caller account and region
//! 2. [`KeyProvisioner`] - cluster access keypair
//! 3. [`ArtifactPublisher`] - artifact bucket, public key, scripts and templates
//! 4. [`ImagePublisher`] - registry repository, login, build-if-absent, push
//! 5. [`SecretProvisioner`] - admin password secret
//! 6. [`ParameterComposer`] - stack parameters, capabilities, template URL
//! 7. [`StackLauncher`] - non-blocking stack submission
//!
//! [`Deployment`] runs them in that order against a [`RunContext`].

pub mod artifacts;
pub mod context;
pub mod error;
pub mod identity;
pub mod image;
pub mod keys;
pub mod launcher;
pub mod parameters;
pub mod pipeline;
pub mod secrets;

pub use artifacts::{ArtifactPublisher, StagedArtifact};
pub use context::{RunContext, Services};
pub use error::{ProvisionError, ProvisionErrorKind, Result};
pub use identity::{CallerIdentity, IdentityResolver};
pub use image::{BuildOutcome, ContainerEngine, ImagePublisher, ImageReference, LocalImage};
pub use keys::{KeyPair, KeyProvisioner};
pub use launcher::StackLauncher;
pub use parameters::{ALLOWED_CAPABILITIES, ComposedStack, DynamicValues, ParameterComposer, StackParameter};
pub use pipeline::{Deployment, DeploymentReport};
pub use secrets::SecretProvisioner;

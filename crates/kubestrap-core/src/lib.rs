//! kubestrap Core - shared types for the cluster bootstrapper
//!
//! This crate provides the foundational pieces used throughout kubestrap:
//! - `DeploymentConfig`: The resolved deployment configuration (defaults + user overrides)
//! - `Values`: Raw configuration tree with deep merge support
//! - `naming`: Deterministic resource names derived from project/environment
//! - `process`: Narrow process-execution abstraction for external tools

pub mod config;
pub mod error;
pub mod naming;
pub mod process;
pub mod values;

pub use config::{
    ArtifactsConfig, CloudFormationConfig, DeploymentConfig, EnvironmentConfig, LogFormat,
    LoggingConfig, ProjectConfig, SecretsConfig,
};
pub use error::{CoreError, Result};
pub use process::{CommandOutput, CommandRunner, CommandSpec, MockCommandRunner, ProcessError, SystemCommandRunner};
pub use values::{Values, parse_set_values};

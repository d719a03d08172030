//! CLI error types with exit code handling
//!
//! Every failure of a command ends up as a [`CliError`], which knows the
//! exit code of its category and renders through miette.

use kubestrap_core::CoreError;
use kubestrap_provision::{ProvisionError, ProvisionErrorKind};
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    #[diagnostic(code(kubestrap::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Could not resolve caller identity: {message}")]
    #[diagnostic(
        code(kubestrap::cli::identity),
        help("configure AWS credentials (environment, profile or instance role) and retry")
    )]
    Identity { message: String },

    #[error("Key generation failed: {message}")]
    #[diagnostic(
        code(kubestrap::cli::keys),
        help("make sure ssh-keygen is installed and the key directory is writable")
    )]
    Keys { message: String },

    #[error("Artifact publishing failed: {message}")]
    #[diagnostic(code(kubestrap::cli::artifacts))]
    Artifacts {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Image build failed: {message}")]
    #[diagnostic(
        code(kubestrap::cli::image_build),
        help("check that docker is running and the build context contains a Dockerfile")
    )]
    ImageBuild { message: String },

    #[error("Image push failed: {message}")]
    #[diagnostic(code(kubestrap::cli::image_push))]
    ImagePush { message: String },

    #[error("Secret write failed: {message}")]
    #[diagnostic(code(kubestrap::cli::secret))]
    Secret { message: String },

    #[error("Invalid stack capabilities: {message}")]
    #[diagnostic(
        code(kubestrap::cli::capabilities),
        help("fix cloudformation.Capabilities in your configuration")
    )]
    Capabilities { message: String },

    #[error("Stack submission failed: {message}")]
    #[diagnostic(code(kubestrap::cli::stack))]
    Stack {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Internal error: {message}")]
    #[diagnostic(code(kubestrap::cli::internal))]
    Internal { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Identity { .. } => exit_codes::IDENTITY_ERROR,
            CliError::Keys { .. } => exit_codes::KEY_ERROR,
            CliError::Artifacts { .. } => exit_codes::ARTIFACT_ERROR,
            CliError::ImageBuild { .. } => exit_codes::IMAGE_BUILD_ERROR,
            CliError::ImagePush { .. } => exit_codes::IMAGE_PUSH_ERROR,
            CliError::Secret { .. } => exit_codes::SECRET_ERROR,
            CliError::Capabilities { .. } => exit_codes::CAPABILITIES_ERROR,
            CliError::Stack { .. } => exit_codes::STACK_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let help = match &err {
            CoreError::ConfigNotFound { .. } => Some("check the path passed with --config".to_string()),
            CoreError::YamlParse(_) => Some("the configuration file must be a YAML mapping".to_string()),
            _ => None,
        };
        CliError::Config {
            message: err.to_string(),
            help,
        }
    }
}

impl From<ProvisionError> for CliError {
    fn from(err: ProvisionError) -> Self {
        let message = match &err.source {
            Some(source) => format!("{} ({})", err.message, source),
            None => err.message.clone(),
        };

        match err.kind {
            ProvisionErrorKind::InvalidConfiguration => CliError::Config {
                message,
                help: None,
            },
            ProvisionErrorKind::IdentityUnavailable => CliError::Identity { message },
            ProvisionErrorKind::KeyGenerationFailure => CliError::Keys { message },
            ProvisionErrorKind::ArtifactPublishFailure => CliError::Artifacts {
                message,
                help: Some("objects uploaded before the failure were left in place; re-run to resume".to_string()),
            },
            ProvisionErrorKind::ImageBuildFailure => CliError::ImageBuild { message },
            ProvisionErrorKind::ImagePushFailure => CliError::ImagePush { message },
            ProvisionErrorKind::SecretWriteFailure => CliError::Secret { message },
            ProvisionErrorKind::InvalidCapabilities => CliError::Capabilities { message },
            ProvisionErrorKind::StackSubmissionFailure => CliError::Stack {
                message,
                help: Some("delete the existing stack or set cloudformation.StackName".to_string()),
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_its_own_exit_code() {
        let kinds = [
            ProvisionErrorKind::IdentityUnavailable,
            ProvisionErrorKind::KeyGenerationFailure,
            ProvisionErrorKind::ArtifactPublishFailure,
            ProvisionErrorKind::ImageBuildFailure,
            ProvisionErrorKind::ImagePushFailure,
            ProvisionErrorKind::SecretWriteFailure,
            ProvisionErrorKind::InvalidCapabilities,
            ProvisionErrorKind::StackSubmissionFailure,
        ];
        let mut codes: Vec<i32> = kinds
            .iter()
            .map(|kind| CliError::from(ProvisionError::new(*kind, "x")).exit_code())
            .collect();
        codes.sort_unstable();
        codes.dedup();

        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&exit_codes::ERROR));
        assert!(!codes.contains(&exit_codes::CONFIG_ERROR));
    }

    #[test]
    fn test_source_is_included_in_message() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CliError::from(
            ProvisionError::new(ProvisionErrorKind::KeyGenerationFailure, "cannot write").with_source(io),
        );
        assert_eq!(err.to_string(), "Key generation failed: cannot write (denied)");
        assert_eq!(err.exit_code(), exit_codes::KEY_ERROR);
    }

    #[test]
    fn test_core_error_is_config() {
        let err = CliError::from(CoreError::ConfigNotFound {
            path: "missing.yaml".to_string(),
        });
        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
    }
}

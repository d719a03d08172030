//! Provisioning errors
//!
//! Every failure of the pipeline is fatal and carries exactly one kind; the
//! CLI maps kinds to exit codes. Messages name resources, never secret values.

use std::fmt;
use thiserror::Error;

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Which step of the pipeline failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisionErrorKind {
    /// Resolved configuration cannot be used (e.g. derived names too long)
    InvalidConfiguration,
    IdentityUnavailable,
    KeyGenerationFailure,
    ArtifactPublishFailure,
    ImageBuildFailure,
    /// Repository, registry login or push failed
    ImagePushFailure,
    SecretWriteFailure,
    InvalidCapabilities,
    StackSubmissionFailure,
}

impl ProvisionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidConfiguration => "invalid configuration",
            Self::IdentityUnavailable => "identity unavailable",
            Self::KeyGenerationFailure => "key generation failed",
            Self::ArtifactPublishFailure => "artifact publish failed",
            Self::ImageBuildFailure => "image build failed",
            Self::ImagePushFailure => "image push failed",
            Self::SecretWriteFailure => "secret write failed",
            Self::InvalidCapabilities => "invalid capabilities",
            Self::StackSubmissionFailure => "stack submission failed",
        }
    }
}

impl fmt::Display for ProvisionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ProvisionError {
    pub kind: ProvisionErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ProvisionError {
    pub fn new(kind: ProvisionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is(&self, kind: ProvisionErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<kubestrap_core::CoreError> for ProvisionError {
    fn from(err: kubestrap_core::CoreError) -> Self {
        ProvisionError::new(ProvisionErrorKind::InvalidConfiguration, err.to_string())
    }
}

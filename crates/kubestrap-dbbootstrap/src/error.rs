//! Bootstrap errors

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Which stage of an accepted event failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapErrorKind {
    SecretRetrieval,
    CertificateDownload,
    ScriptDownload,
    ScriptExecution,
}

impl BootstrapErrorKind {
    /// Message placed in the `Data` field of a failed result
    pub fn summary(self) -> &'static str {
        match self {
            Self::SecretRetrieval => {
                "ERROR: Unexpected error: Couldn't retrieve secret from AWS SecretManager."
            }
            Self::CertificateDownload => {
                "ERROR: Unexpected error: Couldn't download global certificates."
            }
            Self::ScriptDownload => "ERROR: Unexpected error: Couldn't download SQL script from S3.",
            Self::ScriptExecution => "ERROR: Unexpected error: Failed to execute SQL script.",
        }
    }
}

impl fmt::Display for BootstrapErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SecretRetrieval => "secret retrieval failed",
            Self::CertificateDownload => "certificate download failed",
            Self::ScriptDownload => "script download failed",
            Self::ScriptExecution => "script execution failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct BootstrapError {
    pub kind: BootstrapErrorKind,
    pub message: String,
    /// Captured client output, when the failure happened after execution started
    pub output: Option<String>,
}

impl BootstrapError {
    pub fn new(kind: BootstrapErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summaries_are_distinct() {
        let kinds = [
            BootstrapErrorKind::SecretRetrieval,
            BootstrapErrorKind::CertificateDownload,
            BootstrapErrorKind::ScriptDownload,
            BootstrapErrorKind::ScriptExecution,
        ];
        for kind in kinds {
            assert!(kind.summary().starts_with("ERROR: Unexpected error: "));
        }
        assert!(
            BootstrapErrorKind::SecretRetrieval
                .summary()
                .contains("Couldn't retrieve secret")
        );
    }

    #[test]
    fn test_display() {
        let err = BootstrapError::new(BootstrapErrorKind::ScriptDownload, "s3://b/init.sql: not found");
        assert_eq!(err.to_string(), "script download failed: s3://b/init.sql: not found");
    }
}

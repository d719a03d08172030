//! Provider-neutral cloud errors

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use thiserror::Error;

/// Result type for cloud service calls
pub type Result<T> = std::result::Result<T, CloudError>;

/// Classified failure of a cloud API call
///
/// Only the distinctions callers act on are kept; everything else is `Other`
/// with the provider's full error chain as message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloudError {
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Exists, owned by someone else (or owner unknown)
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// Exists and is already owned by the caller
    #[error("resource already owned by caller: {0}")]
    AlreadyOwned(String),

    #[error("decryption failure: {0}")]
    DecryptionFailure(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal service error: {0}")]
    InternalService(String),

    #[error("{0}")]
    Other(String),
}

impl CloudError {
    /// Classify by provider error code
    pub fn from_code(code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            Some(
                "NoSuchBucket" | "NoSuchKey" | "NotFound" | "ResourceNotFoundException"
                | "RepositoryNotFoundException",
            ) => CloudError::NotFound(message),
            Some(
                "BucketAlreadyExists" | "ResourceExistsException" | "AlreadyExistsException"
                | "RepositoryAlreadyExistsException",
            ) => CloudError::AlreadyExists(message),
            Some("BucketAlreadyOwnedByYou") => CloudError::AlreadyOwned(message),
            Some("DecryptionFailure" | "DecryptionFailureException") => {
                CloudError::DecryptionFailure(message)
            }
            Some("InvalidParameterException" | "ValidationError") => {
                CloudError::InvalidParameter(message)
            }
            Some("InvalidRequestException") => CloudError::InvalidRequest(message),
            Some(
                "InternalServiceError" | "InternalServiceErrorException" | "InternalFailure"
                | "InternalError",
            ) => CloudError::InternalService(message),
            _ => CloudError::Other(message),
        }
    }

    /// Classify an SDK error, keeping its full context chain as message
    pub fn from_sdk<E>(err: E) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error,
    {
        let code = err.code().map(str::to_string);
        Self::from_code(code.as_deref(), DisplayErrorContext(&err).to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, CloudError::AlreadyExists(_))
    }

    pub fn is_already_owned(&self) -> bool {
        matches!(self, CloudError::AlreadyOwned(_))
    }
}

//! Thumbprint errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ThumbprintError>;

#[derive(Debug, Error)]
pub enum ThumbprintError {
    #[error("resource property {0} is required")]
    MissingProperty(&'static str),

    #[error("invalid provider URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("cannot reach {host}:{port}: {message}")]
    Connect {
        host: String,
        port: u16,
        message: String,
    },

    #[error("TLS handshake with {host} failed: {message}")]
    Handshake { host: String, message: String },

    #[error("{host} presented no certificates")]
    EmptyChain { host: String },

    #[error("cannot build TLS client: {0}")]
    TlsConfig(String),

    #[error("cannot deliver response to CloudFormation: {0}")]
    Delivery(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ThumbprintError::Connect {
            host: "oidc.example.com".to_string(),
            port: 443,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "cannot reach oidc.example.com:443: connection refused");
        assert_eq!(
            ThumbprintError::MissingProperty("OidcProviderUrl").to_string(),
            "resource property OidcProviderUrl is required"
        );
    }
}

//! Certificate chain retrieval and SHA-1 thumbprints
//!
//! The thumbprint of an OIDC provider is the SHA-1 of the last certificate
//! the server presents during the TLS handshake, as lowercase hex.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use sha1::{Digest, Sha1};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use url::Url;

use crate::error::{Result, ThumbprintError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Host and port of an `https` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = |message: String| ThumbprintError::InvalidUrl {
            url: url.to_string(),
            message,
        };

        let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
        if parsed.scheme() != "https" {
            return Err(invalid(format!("scheme must be https, got {}", parsed.scheme())));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| invalid("no host".to_string()))?;

        Ok(Self {
            host: host.to_string(),
            port: parsed.port_or_known_default().unwrap_or(443),
        })
    }
}

/// Lowercase hex SHA-1 of a DER certificate
pub fn sha1_thumbprint(der: &[u8]) -> String {
    hex::encode(Sha1::digest(der))
}

/// Source of the certificate chain a server presents
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// DER certificates in the order the server sent them
    async fn chain(&self, endpoint: &Endpoint) -> Result<Vec<Vec<u8>>>;
}

/// Thumbprint of the last certificate served at `url`
pub async fn thumbprint(source: &dyn CertificateSource, url: &str) -> Result<String> {
    let endpoint = Endpoint::parse(url)?;
    let chain = source.chain(&endpoint).await?;

    let last = chain.last().ok_or_else(|| ThumbprintError::EmptyChain {
        host: endpoint.host.clone(),
    })?;
    tracing::debug!(host = %endpoint.host, certificates = chain.len(), "received certificate chain");

    Ok(sha1_thumbprint(last))
}

/// Reads the chain from a verified TLS handshake
pub struct TlsCertificateSource {
    config: Arc<ClientConfig>,
    timeout: Duration,
}

impl TlsCertificateSource {
    /// Client trusting the Mozilla root set
    pub fn new() -> Result<Self> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| ThumbprintError::TlsConfig(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        Ok(Self {
            config: Arc::new(config),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn handshake(&self, endpoint: &Endpoint) -> Result<Vec<Vec<u8>>> {
        let server_name =
            ServerName::try_from(endpoint.host.clone()).map_err(|e| ThumbprintError::InvalidUrl {
                url: endpoint.host.clone(),
                message: e.to_string(),
            })?;

        let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| ThumbprintError::Connect {
                host: endpoint.host.clone(),
                port: endpoint.port,
                message: e.to_string(),
            })?;

        let tls = TlsConnector::from(self.config.clone())
            .connect(server_name, tcp)
            .await
            .map_err(|e| ThumbprintError::Handshake {
                host: endpoint.host.clone(),
                message: e.to_string(),
            })?;

        let (_, session) = tls.get_ref();
        Ok(session
            .peer_certificates()
            .map(|certs| certs.iter().map(|cert| cert.as_ref().to_vec()).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl CertificateSource for TlsCertificateSource {
    async fn chain(&self, endpoint: &Endpoint) -> Result<Vec<Vec<u8>>> {
        tokio::time::timeout(self.timeout, self.handshake(endpoint))
            .await
            .map_err(|_| ThumbprintError::Connect {
                host: endpoint.host.clone(),
                port: endpoint.port,
                message: format!("timed out after {:?}", self.timeout),
            })?
    }
}

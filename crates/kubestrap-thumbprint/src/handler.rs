//! Custom resource lifecycle
//!
//! Create resolves the thumbprint of `OidcProviderUrl` and uses the URL as
//! physical id. Update only resolves again when the URL changed. Delete
//! always succeeds. Every outcome, failures included, is a response for
//! CloudFormation; nothing is retried.

use std::sync::Arc;

use crate::error::{Result, ThumbprintError};
use crate::request::{
    CustomResourceRequest, CustomResourceResponse, OIDC_PROVIDER_URL, RequestType, SHA1_ATTRIBUTE,
};
use crate::thumbprint::{CertificateSource, TlsCertificateSource, thumbprint};

pub struct ThumbprintHandler {
    source: Arc<dyn CertificateSource>,
}

impl ThumbprintHandler {
    pub fn new(source: Arc<dyn CertificateSource>) -> Self {
        Self { source }
    }

    /// Handler reading chains over verified TLS
    pub fn tls() -> Result<Self> {
        Ok(Self::new(Arc::new(TlsCertificateSource::new()?)))
    }

    pub async fn handle(&self, request: &CustomResourceRequest) -> CustomResourceResponse {
        tracing::info!(
            request_type = ?request.request_type,
            request_id = %request.request_id,
            logical_id = %request.logical_resource_id,
            "received custom resource request"
        );

        match request.request_type {
            RequestType::Create => self.resolve(request).await,
            RequestType::Update => match (request.provider_url(), &request.physical_resource_id) {
                (Some(url), Some(current)) if url == current.as_str() => {
                    tracing::info!(url = %url, "provider URL unchanged");
                    CustomResourceResponse::success(request, current.clone())
                }
                _ => self.resolve(request).await,
            },
            RequestType::Delete => CustomResourceResponse::success(request, current_id(request)),
        }
    }

    async fn resolve(&self, request: &CustomResourceRequest) -> CustomResourceResponse {
        let Some(url) = request.provider_url() else {
            let err = ThumbprintError::MissingProperty(OIDC_PROVIDER_URL);
            tracing::error!(error = %err, "invalid custom resource request");
            return CustomResourceResponse::failed(request, current_id(request), err.to_string());
        };

        match thumbprint(self.source.as_ref(), url).await {
            Ok(sha1) => {
                tracing::info!(url = %url, "retrieved thumbprint");
                CustomResourceResponse::success(request, url).with_data(SHA1_ATTRIBUTE, sha1)
            }
            Err(e) => {
                tracing::error!(url = %url, error = %e, "cannot retrieve thumbprint");
                CustomResourceResponse::failed(request, url, e.to_string())
            }
        }
    }
}

/// Existing physical id, or the logical id before one was assigned
fn current_id(request: &CustomResourceRequest) -> String {
    request
        .physical_resource_id
        .clone()
        .unwrap_or_else(|| request.logical_resource_id.clone())
}

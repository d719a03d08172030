//! CloudFormation custom resource requests and responses

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Resource property naming the OIDC provider
pub const OIDC_PROVIDER_URL: &str = "OidcProviderUrl";

/// Response attribute carrying the thumbprint
pub const SHA1_ATTRIBUTE: &str = "sha1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceRequest {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    /// Absent on Create
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: BTreeMap<String, JsonValue>,
}

impl CustomResourceRequest {
    /// The `OidcProviderUrl` property, when set to a non-empty string
    pub fn provider_url(&self) -> Option<&str> {
        self.resource_properties
            .get(OIDC_PROVIDER_URL)
            .and_then(JsonValue::as_str)
            .filter(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Body PUT to the request's presigned `ResponseURL`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub no_echo: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl CustomResourceResponse {
    pub fn success(request: &CustomResourceRequest, physical_resource_id: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            reason: None,
            physical_resource_id: physical_resource_id.into(),
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            no_echo: true,
            data: BTreeMap::new(),
        }
    }

    pub fn failed(
        request: &CustomResourceRequest,
        physical_resource_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            status: ResponseStatus::Failed,
            reason: Some(reason.into()),
            ..Self::success(request, physical_resource_id)
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

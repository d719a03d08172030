//! Stack parameter composition

use kubestrap_aws::StackRequest;
use kubestrap_core::DeploymentConfig;
use kubestrap_core::naming::template_url;
use serde_json::Value as JsonValue;

use crate::error::{ProvisionError, ProvisionErrorKind, Result};

/// Capabilities a stack may be granted
pub const ALLOWED_CAPABILITIES: &[&str] = &[
    "CAPABILITY_IAM",
    "CAPABILITY_NAMED_IAM",
    "CAPABILITY_AUTO_EXPAND",
];

/// Parameters every composed stack carries
const REQUIRED_PARAMETERS: &[&str] = &["ProjectName", "EnvironmentName", "S3BucketName"];

/// Reject the whole set if any capability is outside [`ALLOWED_CAPABILITIES`]
pub fn validate_capabilities(capabilities: &[String]) -> Result<()> {
    let unknown: Vec<&str> = capabilities
        .iter()
        .map(String::as_str)
        .filter(|c| !ALLOWED_CAPABILITIES.contains(c))
        .collect();

    if unknown.is_empty() {
        return Ok(());
    }

    tracing::error!(capabilities = ?unknown, "unrecognized stack capabilities");
    Err(ProvisionError::new(
        ProvisionErrorKind::InvalidCapabilities,
        format!(
            "unrecognized capabilities {}; allowed: {}",
            unknown.join(", "),
            ALLOWED_CAPABILITIES.join(", ")
        ),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackParameter {
    pub key: String,
    pub value: String,
}

impl StackParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Values only known once the run has resolved identity and published artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicValues {
    pub artifact_bucket: String,
    pub cache_bucket: String,
    pub account_id: String,
    pub region: String,
    pub image_uri: String,
}

/// Everything the launcher submits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedStack {
    pub stack_name: String,
    pub template_url: String,
    pub parameters: Vec<StackParameter>,
    pub capabilities: Vec<String>,
}

impl ComposedStack {
    pub fn to_request(&self) -> StackRequest {
        StackRequest {
            stack_name: self.stack_name.clone(),
            template_url: self.template_url.clone(),
            parameters: self
                .parameters
                .iter()
                .map(|p| (p.key.clone(), p.value.clone()))
                .collect(),
            capabilities: self.capabilities.clone(),
        }
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}

pub struct ParameterComposer;

impl ParameterComposer {
    /// Merge configured parameters with run values
    ///
    /// Configured parameters keep their order. Run values follow, replacing
    /// a configured entry of the same key in place.
    pub fn compose(config: &DeploymentConfig, dynamic: &DynamicValues) -> Result<ComposedStack> {
        let cfn = &config.cloudformation;
        validate_capabilities(&cfn.capabilities)?;

        let mut parameters = Vec::with_capacity(cfn.parameters.len() + 7);
        for (key, value) in &cfn.parameters {
            parameters.push(StackParameter::new(key, scalar_to_string(key, value)?));
        }

        let run_values = [
            ("ProjectName", config.project_name()),
            ("EnvironmentName", config.environment_name()),
            ("S3BucketName", dynamic.artifact_bucket.as_str()),
            ("KeycloakCacheBucketName", dynamic.cache_bucket.as_str()),
            ("AccountId", dynamic.account_id.as_str()),
            ("Region", dynamic.region.as_str()),
            ("DBBootstrapImageUri", dynamic.image_uri.as_str()),
        ];
        for (key, value) in run_values {
            match parameters.iter_mut().find(|p| p.key == key) {
                Some(existing) => {
                    if existing.value != value {
                        tracing::debug!(parameter = %key, "run value overrides configured parameter");
                    }
                    existing.value = value.to_string();
                }
                None => parameters.push(StackParameter::new(key, value)),
            }
        }

        for required in REQUIRED_PARAMETERS {
            if !parameters.iter().any(|p| p.key == *required && !p.value.is_empty()) {
                return Err(ProvisionError::new(
                    ProvisionErrorKind::InvalidConfiguration,
                    format!("stack parameter '{}' is empty", required),
                ));
            }
        }

        let template_url = template_url(&dynamic.artifact_bucket);
        if let Some(configured) = cfn.template_url.as_ref().filter(|c| **c != template_url) {
            tracing::warn!(
                configured = %configured,
                derived = %template_url,
                "ignoring configured TemplateURL"
            );
        }

        Ok(ComposedStack {
            stack_name: config.stack_name(),
            template_url,
            parameters,
            capabilities: cfn.capabilities.clone(),
        })
    }
}

fn scalar_to_string(key: &str, value: &JsonValue) -> Result<String> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        JsonValue::Null => Ok(String::new()),
        _ => Err(ProvisionError::new(
            ProvisionErrorKind::InvalidConfiguration,
            format!("stack parameter '{}' must be a scalar", key),
        )),
    }
}

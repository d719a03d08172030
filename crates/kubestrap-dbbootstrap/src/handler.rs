//! Bootstrap handler
//!
//! One invocation walks `ReceivedEvent -> Filtered -> SecretFetched ->
//! CertsFetched -> ScriptFetched -> Executed`, stopping at the first failure.
//! Nothing is retried and nothing is locked: a redelivered event runs the
//! script again.

use std::fmt;
use std::sync::Arc;

use kubestrap_aws::{
    AwsObjectStore, AwsSecrets, CloudError, ObjectStore, SecretStore, load_sdk_config,
};
use kubestrap_core::{CommandRunner, SystemCommandRunner};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::downloads::{fetch_script, fetch_trust_bundle};
use crate::error::{BootstrapError, BootstrapErrorKind, Result};
use crate::event::{EventClass, classify};
use crate::psql::SqlClient;
use crate::settings::BootstrapSettings;

/// Last state an invocation reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    ReceivedEvent,
    Rejected,
    Accepted,
    SecretFetched,
    CertsFetched,
    ScriptFetched,
    Executed,
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReceivedEvent => "received-event",
            Self::Rejected => "rejected",
            Self::Accepted => "accepted",
            Self::SecretFetched => "secret-fetched",
            Self::CertsFetched => "certs-fetched",
            Self::ScriptFetched => "script-fetched",
            Self::Executed => "executed",
        };
        f.write_str(name)
    }
}

/// Structured result returned to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapResult {
    pub success: bool,

    /// Client output on success, a description otherwise
    #[serde(rename = "Data")]
    pub data: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,

    #[serde(skip)]
    pub state: BootstrapState,

    #[serde(skip)]
    pub error: Option<BootstrapErrorKind>,
}

impl BootstrapResult {
    fn executed(stdout: String) -> Self {
        Self {
            success: true,
            data: stdout.clone(),
            raw_output: Some(stdout),
            state: BootstrapState::Executed,
            error: None,
        }
    }

    fn rejected(message: &str) -> Self {
        Self {
            success: true,
            data: format!("{} is unsupported event type", message),
            raw_output: None,
            state: BootstrapState::Rejected,
            error: None,
        }
    }

    fn failed(state: BootstrapState, error: BootstrapError) -> Self {
        Self {
            success: false,
            data: error.kind.summary().to_string(),
            raw_output: error.output,
            state,
            error: Some(error.kind),
        }
    }

    /// Informational result for an event that is not an instance start
    pub fn is_rejection(&self) -> bool {
        self.state == BootstrapState::Rejected
    }
}

pub struct BootstrapHandler {
    settings: BootstrapSettings,
    secrets: Arc<dyn SecretStore>,
    objects: Arc<dyn ObjectStore>,
    http: reqwest::Client,
    sql: SqlClient,
}

impl BootstrapHandler {
    pub fn new(
        settings: BootstrapSettings,
        secrets: Arc<dyn SecretStore>,
        objects: Arc<dyn ObjectStore>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            settings,
            secrets,
            objects,
            http: reqwest::Client::new(),
            sql: SqlClient::new(runner),
        }
    }

    /// Handler talking to AWS in the settings' region and running the real client
    pub async fn aws(settings: BootstrapSettings) -> Self {
        let sdk = load_sdk_config(Some(&settings.region)).await;
        Self::new(
            settings,
            Arc::new(AwsSecrets::new(&sdk)),
            Arc::new(AwsObjectStore::new(&sdk)),
            Arc::new(SystemCommandRunner),
        )
    }

    pub fn settings(&self) -> &BootstrapSettings {
        &self.settings
    }

    /// Handle one invocation payload
    pub async fn handle(&self, event: &JsonValue) -> BootstrapResult {
        let mut state = BootstrapState::ReceivedEvent;
        tracing::debug!(state = %state, "bootstrap invocation");

        match classify(event) {
            EventClass::Rejected { message, reason } => {
                tracing::info!(reason = %reason, "ignoring event that is not an instance start");
                return BootstrapResult::rejected(&message);
            }
            EventClass::Accepted { .. } => {
                state = BootstrapState::Accepted;
                tracing::info!(state = %state, "received instance started event");
            }
        }

        match self.bootstrap(&mut state).await {
            Ok(stdout) => BootstrapResult::executed(stdout),
            Err(error) => {
                tracing::error!(state = %state, error = %error, "{}", error.kind.summary());
                BootstrapResult::failed(state, error)
            }
        }
    }

    async fn bootstrap(&self, state: &mut BootstrapState) -> Result<String> {
        let password = self.fetch_password().await?;
        *state = BootstrapState::SecretFetched;

        let bundle = self.settings.bundle_path();
        fetch_trust_bundle(&self.http, &self.settings.certs_url, &bundle).await?;
        *state = BootstrapState::CertsFetched;

        let script = self.settings.script_path();
        fetch_script(
            self.objects.as_ref(),
            &self.settings.script_bucket,
            &self.settings.script_key,
            &script,
        )
        .await?;
        *state = BootstrapState::ScriptFetched;

        let stdout = self
            .sql
            .execute(&self.settings, &password, &script, &bundle)
            .await?;
        *state = BootstrapState::Executed;
        Ok(stdout)
    }

    /// Database password from the `password` field of the secret's JSON value
    async fn fetch_password(&self) -> Result<String> {
        let secret_id = &self.settings.secret_id;
        tracing::info!(secret = %secret_id, "retrieving database secret");

        let value = self
            .secrets
            .get_secret_string(secret_id)
            .await
            .map_err(|e| {
                log_secret_error(secret_id, &e);
                BootstrapError::new(BootstrapErrorKind::SecretRetrieval, e.to_string())
            })?;

        let parsed: JsonValue = serde_json::from_str(&value).map_err(|_| {
            tracing::error!(secret = %secret_id, "secret value is not JSON");
            BootstrapError::new(
                BootstrapErrorKind::SecretRetrieval,
                format!("secret '{}' is not a JSON document", secret_id),
            )
        })?;

        parsed
            .get("password")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                tracing::error!(secret = %secret_id, "secret has no password field");
                BootstrapError::new(
                    BootstrapErrorKind::SecretRetrieval,
                    format!("secret '{}' has no 'password' field", secret_id),
                )
            })
    }
}

fn log_secret_error(secret_id: &str, error: &CloudError) {
    let detail = match error {
        CloudError::DecryptionFailure(_) => "secret cannot be decrypted with its KMS key",
        CloudError::InternalService(_) => "secrets service reported an internal error",
        CloudError::InvalidParameter(_) => "invalid parameter in secret request",
        CloudError::InvalidRequest(_) => "secret request not valid for the secret's current state",
        CloudError::NotFound(_) => "secret not found",
        _ => "secret lookup failed",
    };
    tracing::error!(secret = %secret_id, error = %error, "{}", detail);
}

//! Identity resolution

use std::sync::Arc;

use kubestrap_aws::IdentityService;

use crate::error::{ProvisionError, ProvisionErrorKind, Result};

/// Authenticated caller, fetched once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account_id: String,
    pub region: String,
}

pub struct IdentityResolver {
    identity: Arc<dyn IdentityService>,
}

impl IdentityResolver {
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        Self { identity }
    }

    /// Resolve the caller's account for `region`
    ///
    /// Not retried: credential problems do not fix themselves within a run.
    pub async fn resolve(&self, region: &str) -> Result<CallerIdentity> {
        let account_id = self.identity.caller_account().await.map_err(|e| {
            tracing::error!(error = %e, "could not resolve caller identity");
            ProvisionError::new(
                ProvisionErrorKind::IdentityUnavailable,
                "could not resolve the caller's AWS account; check credentials",
            )
            .with_source(e)
        })?;

        if account_id.trim().is_empty() {
            return Err(ProvisionError::new(
                ProvisionErrorKind::IdentityUnavailable,
                "identity service returned an empty account id",
            ));
        }

        tracing::info!(account = %account_id, region = %region, "resolved caller identity");

        Ok(CallerIdentity {
            account_id,
            region: region.to_string(),
        })
    }
}

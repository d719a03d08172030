//! Managed secret provisioning

use std::sync::Arc;

use kubestrap_aws::SecretStore;
use rand::Rng;
use rand::distr::Alphanumeric;

use crate::error::{ProvisionError, ProvisionErrorKind, Result};

const PASSWORD_LEN: usize = 32;

/// Random alphanumeric password for the identity provider's admin user
pub fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}

pub struct SecretProvisioner {
    store: Arc<dyn SecretStore>,
}

impl SecretProvisioner {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Create or overwrite secret `secret_id` with `value`
    ///
    /// Writes a new version when the secret exists and creates it otherwise.
    /// The value is never read back.
    pub async fn put_secret(&self, secret_id: &str, value: &str) -> Result<()> {
        match self.store.put_secret_value(secret_id, value).await {
            Ok(()) => {
                tracing::info!(secret = %secret_id, "updated secret value");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                self.store.create_secret(secret_id, value).await.map_err(|e| {
                    tracing::error!(secret = %secret_id, error = %e, "secret creation failed");
                    write_error(secret_id).with_source(e)
                })?;
                tracing::info!(secret = %secret_id, "created secret");
                Ok(())
            }
            Err(e) => {
                tracing::error!(secret = %secret_id, error = %e, "secret write failed");
                Err(write_error(secret_id).with_source(e))
            }
        }
    }
}

fn write_error(secret_id: &str) -> ProvisionError {
    ProvisionError::new(
        ProvisionErrorKind::SecretWriteFailure,
        format!("cannot write secret '{}'", secret_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubestrap_aws::mock::MockOp;
    use kubestrap_aws::{CloudError, MockCloud};

    #[test]
    fn test_generate_password() {
        let a = generate_password();
        let b = generate_password();

        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_creates_missing_secret() {
        let cloud = MockCloud::new();
        let secrets = SecretProvisioner::new(Arc::new(cloud.clone()));

        secrets.put_secret("k8s/dev/keycloak/admin-password", "first").await.unwrap();

        assert_eq!(cloud.secret("k8s/dev/keycloak/admin-password").as_deref(), Some("first"));
        let counts = cloud.operation_counts();
        assert_eq!((counts.put_secret_value, counts.create_secret), (1, 1));
        assert_eq!(counts.get_secret, 0);
    }

    #[tokio::test]
    async fn test_overwrites_existing_secret() {
        let cloud = MockCloud::new();
        cloud.with_secret("admin", "old");
        let secrets = SecretProvisioner::new(Arc::new(cloud.clone()));

        secrets.put_secret("admin", "new").await.unwrap();

        assert_eq!(cloud.secret("admin").as_deref(), Some("new"));
        assert_eq!(cloud.operation_counts().create_secret, 0);
    }

    #[tokio::test]
    async fn test_write_failure() {
        let cloud = MockCloud::new();
        cloud.fail(MockOp::PutSecretValue, CloudError::InternalService("boom".into()));

        let err = SecretProvisioner::new(Arc::new(cloud.clone()))
            .put_secret("admin", "hunter2")
            .await
            .unwrap_err();

        assert!(err.is(ProvisionErrorKind::SecretWriteFailure));
        assert!(!err.to_string().contains("hunter2"));
        assert_eq!(cloud.operation_counts().create_secret, 0);
    }

    #[tokio::test]
    async fn test_create_failure() {
        let cloud = MockCloud::new();
        cloud.fail(MockOp::CreateSecret, CloudError::InvalidRequest("scheduled for deletion".into()));

        let err = SecretProvisioner::new(Arc::new(cloud))
            .put_secret("admin", "x")
            .await
            .unwrap_err();
        assert!(err.is(ProvisionErrorKind::SecretWriteFailure));
    }
}

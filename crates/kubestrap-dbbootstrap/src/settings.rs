//! Handler settings, read from the host environment at cold start

use std::path::PathBuf;
use thiserror::Error;

/// Public trust bundle for database TLS
pub const DEFAULT_CERTS_URL: &str =
    "https://truststore.pki.rds.amazonaws.com/global/global-bundle.pem";

pub const DEFAULT_PSQL_PATH: &str = "/usr/bin/psql";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} is invalid: {message}")]
    Invalid { name: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapSettings {
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    /// Name or ARN of the secret holding `{"password": ...}`
    pub secret_id: String,
    pub region: String,
    pub script_bucket: String,
    pub script_key: String,
    pub psql_path: PathBuf,
    /// Root of the downloaded files (`sql/init.sql`, `global-bundle.pem`)
    pub work_dir: PathBuf,
    pub certs_url: String,
}

impl BootstrapSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(SettingsError::Missing(name))
        };

        let port = required("DBPort")?;
        let db_port = port.trim().parse().map_err(|_| SettingsError::Invalid {
            name: "DBPort",
            message: format!("'{}' is not a port number", port),
        })?;

        Ok(Self {
            db_host: required("DBHost")?,
            db_port,
            db_name: required("DBName")?,
            db_user: required("DBUser")?,
            secret_id: required("Secret_ARN")?,
            region: required("Region_Name")?,
            script_bucket: required("SQLScriptS3Bucket")?,
            script_key: required("SQLScriptS3Key")?,
            psql_path: lookup("PSQL_PATH")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PSQL_PATH)),
            work_dir: std::env::temp_dir(),
            certs_url: DEFAULT_CERTS_URL.to_string(),
        })
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_certs_url(mut self, url: impl Into<String>) -> Self {
        self.certs_url = url.into();
        self
    }

    pub fn script_path(&self) -> PathBuf {
        self.work_dir.join("sql").join("init.sql")
    }

    pub fn bundle_path(&self) -> PathBuf {
        self.work_dir.join("global-bundle.pem")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) fn sample_env() -> HashMap<&'static str, String> {
        [
            ("DBHost", "keycloak.cluster-abc.us-east-1.rds.amazonaws.com"),
            ("DBPort", "5432"),
            ("DBName", "keycloak"),
            ("DBUser", "postgres"),
            ("Secret_ARN", "arn:aws:secretsmanager:us-east-1:123456789012:secret:db"),
            ("Region_Name", "us-east-1"),
            ("SQLScriptS3Bucket", "k8s-k8s-dev-us-east-1-123456789012"),
            ("SQLScriptS3Key", "scripts/db/init.sql"),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect()
    }

    pub(crate) fn sample() -> BootstrapSettings {
        let env = sample_env();
        BootstrapSettings::from_lookup(|name| env.get(name).cloned()).unwrap()
    }

    #[test]
    fn test_from_lookup() {
        let settings = sample();

        assert_eq!(settings.db_port, 5432);
        assert_eq!(settings.secret_id, "arn:aws:secretsmanager:us-east-1:123456789012:secret:db");
        assert_eq!(settings.psql_path, PathBuf::from("/usr/bin/psql"));
        assert_eq!(settings.certs_url, DEFAULT_CERTS_URL);
    }

    #[test]
    fn test_missing_variable() {
        let mut env = sample_env();
        env.remove("SQLScriptS3Key");

        let err = BootstrapSettings::from_lookup(|name| env.get(name).cloned()).unwrap_err();
        assert_eq!(err, SettingsError::Missing("SQLScriptS3Key"));
    }

    #[test]
    fn test_invalid_port() {
        let mut env = sample_env();
        env.insert("DBPort", "postgres".to_string());

        let err = BootstrapSettings::from_lookup(|name| env.get(name).cloned()).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { name: "DBPort", .. }));
    }

    #[test]
    fn test_psql_path_override_and_paths() {
        let mut env = sample_env();
        env.insert("PSQL_PATH", "/opt/bin/psql".to_string());

        let settings = BootstrapSettings::from_lookup(|name| env.get(name).cloned())
            .unwrap()
            .with_work_dir("/tmp/run");

        assert_eq!(settings.psql_path, PathBuf::from("/opt/bin/psql"));
        assert_eq!(settings.script_path(), PathBuf::from("/tmp/run/sql/init.sql"));
        assert_eq!(settings.bundle_path(), PathBuf::from("/tmp/run/global-bundle.pem"));
    }
}

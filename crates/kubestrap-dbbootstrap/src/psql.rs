//! SQL client invocation

use std::path::Path;
use std::sync::Arc;

use kubestrap_core::{CommandRunner, CommandSpec};

use crate::error::{BootstrapError, BootstrapErrorKind, Result};
use crate::settings::BootstrapSettings;

/// Runs a script with `psql` over verified TLS
pub struct SqlClient {
    runner: Arc<dyn CommandRunner>,
}

impl SqlClient {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Command line for one execution
    ///
    /// The password only travels in the child's environment, which holds
    /// nothing else but the TLS settings.
    pub fn command(
        settings: &BootstrapSettings,
        password: &str,
        script: &Path,
        bundle: &Path,
    ) -> CommandSpec {
        CommandSpec::new(settings.psql_path.display().to_string())
            .args([
                "-h".to_string(),
                settings.db_host.clone(),
                "-p".to_string(),
                settings.db_port.to_string(),
                "-U".to_string(),
                settings.db_user.clone(),
                "-d".to_string(),
                settings.db_name.clone(),
                "-f".to_string(),
                script.display().to_string(),
                "-v".to_string(),
                "ON_ERROR_STOP=1".to_string(),
            ])
            .isolated_env()
            .env("PGPASSWORD", password)
            .env("PGSSLMODE", "verify-full")
            .env("PGSSLROOTCERT", bundle.display().to_string())
    }

    /// Execute `script` and return its stdout
    pub async fn execute(
        &self,
        settings: &BootstrapSettings,
        password: &str,
        script: &Path,
        bundle: &Path,
    ) -> Result<String> {
        let spec = Self::command(settings, password, script, bundle);
        tracing::info!(command = %spec, "executing SQL script");

        let output = self.runner.run(&spec).await.map_err(|e| {
            tracing::error!(error = %e, "could not start SQL client");
            BootstrapError::new(BootstrapErrorKind::ScriptExecution, e.to_string())
        })?;

        if !output.is_success() {
            tracing::error!(
                host = %settings.db_host,
                database = %settings.db_name,
                status = %output.describe_failure(),
                "SQL script failed"
            );
            return Err(BootstrapError::new(
                BootstrapErrorKind::ScriptExecution,
                output.describe_failure(),
            )
            .with_output(output.stdout));
        }

        tracing::info!(host = %settings.db_host, database = %settings.db_name, "SQL script executed");
        Ok(output.stdout)
    }
}

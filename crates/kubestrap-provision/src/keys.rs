//! Cluster access keypair

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kubestrap_core::{CommandRunner, CommandSpec};

use crate::error::{ProvisionError, ProvisionErrorKind, Result};

/// Default directory for cluster keys
#[must_use]
pub fn default_key_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".ssh"))
        .unwrap_or_else(|| PathBuf::from(".ssh"))
}

/// Paths of a generated (or reused) keypair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    /// True when an existing keypair was kept instead of generating one
    pub reused: bool,
}

/// Generates RSA-2048 keypairs with `ssh-keygen`
pub struct KeyProvisioner {
    runner: Arc<dyn CommandRunner>,
    key_dir: PathBuf,
    program: String,
}

impl KeyProvisioner {
    pub fn new(runner: Arc<dyn CommandRunner>, key_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            key_dir: key_dir.into(),
            program: "ssh-keygen".to_string(),
        }
    }

    /// Generate the keypair `<key_dir>/<name>` and `<key_dir>/<name>.pub`
    ///
    /// A complete existing pair is reused, so re-runs never prompt for
    /// overwrite. A lone private or public half is an error.
    pub async fn generate(&self, name: &str) -> Result<KeyPair> {
        let private_key = self.key_dir.join(name);
        let public_key = self.key_dir.join(format!("{}.pub", name));

        match (private_key.exists(), public_key.exists()) {
            (true, true) => {
                tracing::info!(path = %public_key.display(), "reusing existing cluster keypair");
                return Ok(KeyPair {
                    private_key,
                    public_key,
                    reused: true,
                });
            }
            (true, false) | (false, true) => {
                return Err(key_error(format!(
                    "incomplete keypair at {}; remove it or restore the missing half",
                    private_key.display()
                )));
            }
            (false, false) => {}
        }

        prepare_key_dir(&self.key_dir)?;

        let spec = CommandSpec::new(&self.program).args([
            "-q".to_string(),
            "-t".to_string(),
            "rsa".to_string(),
            "-b".to_string(),
            "2048".to_string(),
            "-N".to_string(),
            String::new(),
            "-C".to_string(),
            name.to_string(),
            "-f".to_string(),
            private_key.display().to_string(),
        ]);

        let output = self.runner.run(&spec).await.map_err(|e| {
            tracing::error!(error = %e, program = %self.program, "could not run key generator");
            key_error(format!("could not run {}", self.program)).with_source(e)
        })?;

        if !output.is_success() {
            tracing::error!(path = %private_key.display(), status = %output.describe_failure(), "key generation failed");
            return Err(key_error(format!(
                "{} failed for {}: {}",
                self.program,
                private_key.display(),
                output.describe_failure()
            )));
        }

        if !public_key.exists() {
            return Err(key_error(format!(
                "{} reported success but {} was not written",
                self.program,
                public_key.display()
            )));
        }

        tracing::info!(path = %private_key.display(), "generated cluster keypair");

        Ok(KeyPair {
            private_key,
            public_key,
            reused: false,
        })
    }
}

fn key_error(message: String) -> ProvisionError {
    ProvisionError::new(ProvisionErrorKind::KeyGenerationFailure, message)
}

fn prepare_key_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        key_error(format!("cannot create key directory {}", dir.display())).with_source(e)
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(dir)
            .map_err(|e| key_error(format!("cannot stat {}", dir.display())).with_source(e))?
            .permissions();
        if perms.mode() & 0o077 != 0 {
            perms.set_mode(0o700);
            std::fs::set_permissions(dir, perms).map_err(|e| {
                key_error(format!("cannot restrict {}", dir.display())).with_source(e)
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubestrap_core::{CommandOutput, MockCommandRunner};

    /// Emulates ssh-keygen writing both halves to the `-f` path
    fn keygen_writing_files() -> MockCommandRunner {
        let mock = MockCommandRunner::new();
        mock.respond_with(
            |spec| spec.program == "ssh-keygen",
            |spec| {
                let path = spec
                    .args
                    .iter()
                    .skip_while(|a| a.as_str() != "-f")
                    .nth(1)
                    .unwrap();
                std::fs::write(path, "PRIVATE").unwrap();
                std::fs::write(format!("{}.pub", path), "ssh-rsa AAAA").unwrap();
                CommandOutput::success("")
            },
        );
        mock
    }

    #[tokio::test]
    async fn test_generates_rsa_2048_at_deterministic_path() {
        let dir = tempfile::tempdir().unwrap();
        let mock = keygen_writing_files();
        let keys = KeyProvisioner::new(Arc::new(mock.clone()), dir.path().join("ssh"));

        let pair = keys.generate("k8s-dev").await.unwrap();

        assert_eq!(pair.public_key, dir.path().join("ssh/k8s-dev.pub"));
        assert!(!pair.reused);

        let call = &mock.calls()[0];
        let args = call.args.join(" ");
        assert!(args.contains("-t rsa -b 2048"));
        assert!(args.contains("-C k8s-dev"));
        assert!(call.args.contains(&String::new()), "empty passphrase expected");
    }

    #[tokio::test]
    async fn test_existing_pair_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("k8s-dev"), "PRIVATE").unwrap();
        std::fs::write(dir.path().join("k8s-dev.pub"), "PUBLIC").unwrap();
        let mock = MockCommandRunner::new();

        let pair = KeyProvisioner::new(Arc::new(mock.clone()), dir.path())
            .generate("k8s-dev")
            .await
            .unwrap();

        assert!(pair.reused);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_half_pair_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("k8s-dev.pub"), "PUBLIC").unwrap();

        let err = KeyProvisioner::new(Arc::new(MockCommandRunner::new()), dir.path())
            .generate("k8s-dev")
            .await
            .unwrap_err();
        assert!(err.is(ProvisionErrorKind::KeyGenerationFailure));
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockCommandRunner::new();
        mock.fail_to_spawn(|_| true, "No such file or directory");

        let err = KeyProvisioner::new(Arc::new(mock), dir.path())
            .generate("k8s-dev")
            .await
            .unwrap_err();
        assert!(err.is(ProvisionErrorKind::KeyGenerationFailure));
        assert!(err.message.contains("could not run ssh-keygen"));
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockCommandRunner::new();
        mock.respond(|_| true, CommandOutput::failure(1, "Saving key failed"));

        let err = KeyProvisioner::new(Arc::new(mock), dir.path())
            .generate("k8s-dev")
            .await
            .unwrap_err();
        assert!(err.message.contains("Saving key failed"));
    }

    #[tokio::test]
    async fn test_success_without_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        let err = KeyProvisioner::new(Arc::new(MockCommandRunner::new()), dir.path())
            .generate("k8s-dev")
            .await
            .unwrap_err();
        assert!(err.message.contains("was not written"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unwritable_key_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let err = KeyProvisioner::new(Arc::new(keygen_writing_files()), blocker.join("ssh"))
            .generate("k8s-dev")
            .await
            .unwrap_err();
        assert!(err.is(ProvisionErrorKind::KeyGenerationFailure));
        assert!(err.message.contains("cannot create key directory"));
    }
}

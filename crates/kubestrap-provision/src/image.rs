//! Database bootstrap image publishing
//!
//! Ensures the registry repository, logs the container engine in with a
//! fresh token, builds the image only when the tag is missing locally and
//! pushes it. The engine is driven through [`CommandRunner`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use kubestrap_aws::ContainerRegistry;
use kubestrap_core::{CommandOutput, CommandRunner, CommandSpec};

use crate::error::{ProvisionError, ProvisionErrorKind, Result};

/// Repository URI plus tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub repository_uri: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(repository_uri: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository_uri: repository_uri.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository_uri, self.tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Built,
    /// Tag already present locally; build skipped
    Reused,
}

/// An image known to exist locally
///
/// Only [`ImagePublisher::build_if_absent`] produces one, so a failed build
/// can never reach [`ImagePublisher::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    reference: ImageReference,
    outcome: BuildOutcome,
}

impl LocalImage {
    pub fn reference(&self) -> &ImageReference {
        &self.reference
    }

    pub fn outcome(&self) -> BuildOutcome {
        self.outcome
    }
}

/// Thin wrapper over the `docker` CLI
pub struct ContainerEngine {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl ContainerEngine {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: "docker".to_string(),
        }
    }

    async fn run(&self, spec: CommandSpec, kind: ProvisionErrorKind) -> Result<CommandOutput> {
        self.runner.run(&spec).await.map_err(|e| {
            tracing::error!(command = %spec, error = %e, "could not run container engine");
            ProvisionError::new(kind, format!("could not run {}", self.program)).with_source(e)
        })
    }

    /// Whether `image` exists in the local image store
    pub async fn image_exists(&self, image: &ImageReference) -> Result<bool> {
        let spec = CommandSpec::new(&self.program).args([
            "image".to_string(),
            "inspect".to_string(),
            image.to_string(),
        ]);
        let output = self.run(spec, ProvisionErrorKind::ImageBuildFailure).await?;
        Ok(output.is_success())
    }

    pub async fn build(&self, context: &Path, image: &ImageReference) -> Result<CommandOutput> {
        let spec = CommandSpec::new(&self.program).args([
            "build".to_string(),
            "-t".to_string(),
            image.to_string(),
            context.display().to_string(),
        ]);
        self.run(spec, ProvisionErrorKind::ImageBuildFailure).await
    }

    /// Log in with the password on stdin so it never appears in argv
    pub async fn login(&self, registry: &str, username: &str, password: &str) -> Result<CommandOutput> {
        let spec = CommandSpec::new(&self.program)
            .args([
                "login".to_string(),
                "--username".to_string(),
                username.to_string(),
                "--password-stdin".to_string(),
                registry.to_string(),
            ])
            .stdin(password);
        self.run(spec, ProvisionErrorKind::ImagePushFailure).await
    }

    pub async fn push(&self, image: &ImageReference) -> Result<CommandOutput> {
        let spec =
            CommandSpec::new(&self.program).args(["push".to_string(), image.to_string()]);
        self.run(spec, ProvisionErrorKind::ImagePushFailure).await
    }
}

pub struct ImagePublisher {
    registry: Arc<dyn ContainerRegistry>,
    engine: ContainerEngine,
}

impl ImagePublisher {
    pub fn new(registry: Arc<dyn ContainerRegistry>, engine: ContainerEngine) -> Self {
        Self { registry, engine }
    }

    /// Return the URI of repository `name`, creating it when absent
    pub async fn ensure_repository(&self, name: &str) -> Result<String> {
        if let Some(uri) = self.lookup(name).await? {
            tracing::debug!(repository = %name, "repository exists");
            return Ok(uri);
        }

        match self.registry.create_repository(name).await {
            Ok(uri) => {
                tracing::info!(repository = %name, uri = %uri, "created repository");
                Ok(uri)
            }
            // another writer created it between lookup and create
            Err(e) if e.is_already_exists() => {
                tracing::debug!(repository = %name, "repository created concurrently");
                self.lookup(name).await?.ok_or_else(|| {
                    push_error(format!(
                        "repository '{}' reported as existing but cannot be found",
                        name
                    ))
                })
            }
            Err(e) => {
                tracing::error!(repository = %name, error = %e, "repository creation failed");
                Err(push_error(format!("cannot create repository '{}'", name)).with_source(e))
            }
        }
    }

    async fn lookup(&self, name: &str) -> Result<Option<String>> {
        self.registry.repository_uri(name).await.map_err(|e| {
            tracing::error!(repository = %name, error = %e, "repository lookup failed");
            push_error(format!("cannot look up repository '{}'", name)).with_source(e)
        })
    }

    /// Log the engine in to the registry with a freshly fetched token
    pub async fn authenticate(&self) -> Result<()> {
        let token = self.registry.authorization_token().await.map_err(|e| {
            tracing::error!(error = %e, "registry token request failed");
            push_error("cannot obtain registry authorization token".to_string()).with_source(e)
        })?;

        let decoded = BASE64
            .decode(token.token.trim())
            .map_err(|e| push_error("registry token is not valid base64".to_string()).with_source(e))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|e| push_error("registry token is not valid UTF-8".to_string()).with_source(e))?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| push_error("registry token is not of the form user:password".to_string()))?;

        let registry = token
            .endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://");

        let output = self.engine.login(registry, username, password).await?;
        if !output.is_success() {
            tracing::error!(registry = %registry, status = %output.describe_failure(), "registry login failed");
            return Err(push_error(format!(
                "login to {} failed: {}",
                registry,
                output.describe_failure()
            )));
        }

        tracing::info!(registry = %registry, "logged in to registry");
        Ok(())
    }

    /// Build `image` from `context` unless the tag already exists locally
    pub async fn build_if_absent(&self, context: &Path, image: &ImageReference) -> Result<LocalImage> {
        if self.engine.image_exists(image).await? {
            tracing::info!(image = %image, "image present locally; skipping build");
            return Ok(LocalImage {
                reference: image.clone(),
                outcome: BuildOutcome::Reused,
            });
        }

        if !context.is_dir() {
            return Err(ProvisionError::new(
                ProvisionErrorKind::ImageBuildFailure,
                format!("build context {} is not a directory", context.display()),
            ));
        }

        tracing::info!(image = %image, context = %context.display(), "building image");
        let output = self.engine.build(context, image).await?;
        if !output.is_success() {
            tracing::error!(image = %image, status = %output.describe_failure(), "image build failed");
            return Err(ProvisionError::new(
                ProvisionErrorKind::ImageBuildFailure,
                format!("build of {} failed: {}", image, output.describe_failure()),
            ));
        }

        Ok(LocalImage {
            reference: image.clone(),
            outcome: BuildOutcome::Built,
        })
    }

    /// Push a locally present image; not retried
    pub async fn push(&self, image: &LocalImage) -> Result<()> {
        let output = self.engine.push(&image.reference).await?;
        if !output.is_success() {
            tracing::error!(image = %image.reference, status = %output.describe_failure(), "image push failed");
            return Err(push_error(format!(
                "push of {} failed: {}",
                image.reference,
                output.describe_failure()
            )));
        }

        tracing::info!(image = %image.reference, "pushed image");
        Ok(())
    }

    /// Repository, login, build-if-absent and push, in that order
    pub async fn publish(&self, context: &Path, repository: &str, tag: &str) -> Result<ImageReference> {
        let uri = self.ensure_repository(repository).await?;
        self.authenticate().await?;
        let image = ImageReference::new(uri, tag);
        let local = self.build_if_absent(context, &image).await?;
        self.push(&local).await?;
        Ok(image)
    }
}

fn push_error(message: String) -> ProvisionError {
    ProvisionError::new(ProvisionErrorKind::ImagePushFailure, message)
}

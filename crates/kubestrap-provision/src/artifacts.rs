//! Artifact publishing
//!
//! Creates the deployment bucket and mirrors local trees into it. Uploads
//! are planned first (a sorted list of [`StagedArtifact`]) and then performed
//! in order, stopping at the first failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kubestrap_aws::ObjectStore;
use kubestrap_core::naming::DEFAULT_REGION;
use walkdir::WalkDir;

use crate::error::{ProvisionError, ProvisionErrorKind, Result};

/// One planned upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    pub bucket: String,
    pub key: String,
    pub local_path: PathBuf,
}

pub struct ArtifactPublisher {
    store: Arc<dyn ObjectStore>,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Create `bucket` in `region`; an existing bucket we own is fine
    ///
    /// `us-east-1` takes no location constraint, every other region must
    /// name itself.
    pub async fn ensure_bucket(&self, bucket: &str, region: &str) -> Result<()> {
        let constraint = (region != DEFAULT_REGION).then_some(region);

        match self.store.create_bucket(bucket, constraint).await {
            Ok(()) => {
                tracing::info!(bucket = %bucket, region = %region, "created bucket");
                Ok(())
            }
            Err(e) if e.is_already_owned() => {
                tracing::debug!(bucket = %bucket, "bucket already exists");
                Ok(())
            }
            Err(e) if e.is_already_exists() => Err(publish_error(format!(
                "bucket name '{}' is taken by another account",
                bucket
            ))
            .with_source(e)),
            Err(e) => {
                Err(publish_error(format!("cannot create bucket '{}'", bucket)).with_source(e))
            }
        }
    }

    /// Upload a single file to `s3://bucket/key`
    pub async fn upload_file(&self, bucket: &str, path: &Path, key: &str) -> Result<()> {
        if !path.is_file() {
            return Err(publish_error(format!(
                "{} does not exist or is not a file",
                path.display()
            )));
        }

        self.store.put_file(bucket, key, path).await.map_err(|e| {
            tracing::error!(bucket = %bucket, key = %key, error = %e, "upload failed");
            publish_error(format!("upload of s3://{}/{} failed", bucket, key)).with_source(e)
        })?;

        tracing::debug!(bucket = %bucket, key = %key, "uploaded");
        Ok(())
    }

    /// Plan the upload of every regular file under `root`
    ///
    /// Keys are `<prefix>/<path relative to root>` with `/` separators; an
    /// empty prefix leaves the relative path as the key.
    /// Directories and symlinks produce no objects.
    pub fn plan_tree(&self, bucket: &str, root: &Path, prefix: &str) -> Result<Vec<StagedArtifact>> {
        if !root.is_dir() {
            return Err(publish_error(format!(
                "{} does not exist or is not a directory",
                root.display()
            )));
        }

        let prefix = prefix.trim_end_matches('/');
        let mut staged = Vec::new();

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                publish_error(format!("cannot walk {}", root.display())).with_source(e)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| publish_error(format!("{}", e)))?;
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let key = if prefix.is_empty() {
                relative
            } else {
                format!("{}/{}", prefix, relative)
            };

            staged.push(StagedArtifact {
                bucket: bucket.to_string(),
                key,
                local_path: entry.into_path(),
            });
        }

        Ok(staged)
    }

    /// Mirror `root` under `prefix`, stopping at the first failed upload
    ///
    /// Returns the uploaded keys. Objects already written stay in place.
    pub async fn upload_tree(&self, bucket: &str, root: &Path, prefix: &str) -> Result<Vec<String>> {
        let staged = self.plan_tree(bucket, root, prefix)?;
        let mut uploaded = Vec::with_capacity(staged.len());

        for artifact in staged {
            self.upload_file(&artifact.bucket, &artifact.local_path, &artifact.key)
                .await?;
            uploaded.push(artifact.key);
        }

        tracing::info!(
            bucket = %bucket,
            prefix = %prefix,
            count = uploaded.len(),
            "uploaded tree"
        );
        Ok(uploaded)
    }
}

fn publish_error(message: String) -> ProvisionError {
    ProvisionError::new(ProvisionErrorKind::ArtifactPublishFailure, message)
}

//! Deterministic resource names
//!
//! Every cloud resource the pipeline touches is named from the project,
//! environment, region and account alone, so a re-run finds the resources a
//! previous run created.

use crate::error::{CoreError, Result};

/// Region in which S3 rejects an explicit location constraint
pub const DEFAULT_REGION: &str = "us-east-1";

/// Key prefix of the uploaded scripts tree
pub const SCRIPTS_PREFIX: &str = "scripts";

/// Key prefix of the uploaded templates tree
pub const TEMPLATES_PREFIX: &str = "templates";

/// Entry template of the stack, relative to [`TEMPLATES_PREFIX`]
pub const MAIN_TEMPLATE: &str = "main.yaml";

/// Object key of the cluster public key
pub const PUBLIC_KEY_OBJECT_KEY: &str = "ssh/client-key.pub";

/// Tag pushed for the database bootstrap image
pub const IMAGE_TAG: &str = "latest";

const MAX_BUCKET_NAME_LEN: usize = 63;

/// Names derived for one project/environment/region/account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    /// `<project>-<environment>`, used for the keypair file
    pub key_name: String,
    /// Bucket holding scripts, templates and the public key
    pub artifact_bucket: String,
    /// Bucket handed to the stack for the identity provider's cache
    pub cache_bucket: String,
    /// Container repository of the database bootstrap image
    pub image_repository: String,
}

impl ResourceNames {
    pub fn new(project: &str, environment: &str, region: &str, account: &str) -> Result<Self> {
        let suffix = format!("{}-{}-{}-{}", project, environment, region, account);
        let names = Self {
            key_name: key_name(project, environment),
            artifact_bucket: format!("k8s-{}", suffix),
            cache_bucket: format!("keycloak-cache-{}", suffix),
            image_repository: format!("{}/{}/lambda/dbbootstrap", project, environment),
        };

        for bucket in [&names.artifact_bucket, &names.cache_bucket] {
            if bucket.len() > MAX_BUCKET_NAME_LEN {
                return Err(CoreError::InvalidConfig {
                    message: format!(
                        "bucket name '{}' exceeds {} characters; shorten project or environment name",
                        bucket, MAX_BUCKET_NAME_LEN
                    ),
                });
            }
        }

        Ok(names)
    }
}

pub fn key_name(project: &str, environment: &str) -> String {
    format!("{}-{}", project, environment)
}

/// Template URL of the stack, derived from the artifact bucket
pub fn template_url(bucket: &str) -> String {
    format!(
        "https://s3.amazonaws.com/{}/{}/{}",
        bucket, TEMPLATES_PREFIX, MAIN_TEMPLATE
    )
}

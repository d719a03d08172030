//! Object storage (S3)

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use std::path::Path;

use crate::error::{CloudError, Result};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a bucket
    ///
    /// `location_constraint` is sent verbatim; `None` sends no bucket
    /// configuration at all. Callers decide which regions need one.
    async fn create_bucket(&self, bucket: &str, location_constraint: Option<&str>) -> Result<()>;

    /// Upload a local file, overwriting any object at `key`
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()>;

    /// Download an object into memory
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

pub struct AwsObjectStore {
    client: aws_sdk_s3::Client,
}

impl AwsObjectStore {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait]
impl ObjectStore for AwsObjectStore {
    async fn create_bucket(&self, bucket: &str, location_constraint: Option<&str>) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);

        if let Some(region) = location_constraint {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        request.send().await.map_err(CloudError::from_sdk)?;
        Ok(())
    }

    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| CloudError::Other(format!("cannot read {}: {}", path.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(CloudError::from_sdk)?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(CloudError::from_sdk)?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| CloudError::Other(format!("failed reading s3://{}/{}: {}", bucket, key, e)))?;

        Ok(data.into_bytes().to_vec())
    }
}

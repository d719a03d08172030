//! In-memory cloud for testing
//!
//! `MockCloud` implements every service trait against shared in-memory
//! state, so a single instance can stand in for a whole account. Clones share
//! state. Failures can be injected per operation.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::error::{CloudError, Result};
use crate::identity::IdentityService;
use crate::registry::{ContainerRegistry, RegistryToken};
use crate::secrets::SecretStore;
use crate::stacks::{StackRequest, StackService};
use crate::storage::ObjectStore;

/// Account id reported by a default mock
pub const MOCK_ACCOUNT: &str = "123456789012";

/// Registry host of a default mock
pub const MOCK_REGISTRY: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com";

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Identity,
    CreateBucket,
    PutObject,
    GetObject,
    DescribeRepository,
    CreateRepository,
    AuthorizationToken,
    PutSecretValue,
    CreateSecret,
    GetSecret,
    CreateStack,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub identity: usize,
    pub create_bucket: usize,
    pub put_object: usize,
    pub get_object: usize,
    pub describe_repository: usize,
    pub create_repository: usize,
    pub authorization_token: usize,
    pub put_secret_value: usize,
    pub create_secret: usize,
    pub get_secret: usize,
    pub create_stack: usize,
}

impl OperationCounts {
    pub fn total(&self) -> usize {
        self.identity
            + self.create_bucket
            + self.put_object
            + self.get_object
            + self.describe_repository
            + self.create_repository
            + self.authorization_token
            + self.put_secret_value
            + self.create_secret
            + self.get_secret
            + self.create_stack
    }
}

#[derive(Default)]
struct State {
    account: Option<String>,
    /// bucket -> location constraint it was created with
    buckets: BTreeMap<String, Option<String>>,
    foreign_buckets: HashSet<String>,
    bucket_requests: Vec<(String, Option<String>)>,
    objects: BTreeMap<(String, String), Vec<u8>>,
    repositories: HashMap<String, String>,
    racing_repositories: HashSet<String>,
    registry_token: String,
    secrets: HashMap<String, String>,
    stacks: Vec<StackRequest>,
    failures: HashMap<MockOp, CloudError>,
    failing_keys: HashMap<String, CloudError>,
    counts: OperationCounts,
}

#[derive(Clone)]
pub struct MockCloud {
    state: Arc<RwLock<State>>,
}

impl Default for MockCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCloud {
    /// Empty account `123456789012` with a registry token for `AWS:password`
    pub fn new() -> Self {
        let state = State {
            account: Some(MOCK_ACCOUNT.to_string()),
            registry_token: "QVdTOnBhc3N3b3Jk".to_string(),
            ..State::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Make identity lookups fail as if no credentials were configured
    pub fn without_credentials(self) -> Self {
        self.state.write().unwrap().account = None;
        self
    }

    /// Fail every call of `op` with `error`
    pub fn fail(&self, op: MockOp, error: CloudError) -> &Self {
        self.state.write().unwrap().failures.insert(op, error);
        self
    }

    /// Fail uploads of one object key
    pub fn fail_object_key(&self, key: &str, error: CloudError) -> &Self {
        self.state
            .write()
            .unwrap()
            .failing_keys
            .insert(key.to_string(), error);
        self
    }

    /// Register a bucket name taken by another account
    pub fn with_foreign_bucket(&self, bucket: &str) -> &Self {
        self.state
            .write()
            .unwrap()
            .foreign_buckets
            .insert(bucket.to_string());
        self
    }

    pub fn with_object(&self, bucket: &str, key: &str, data: &[u8]) -> &Self {
        let mut state = self.state.write().unwrap();
        state.buckets.entry(bucket.to_string()).or_insert(None);
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), data.to_vec());
        self
    }

    pub fn with_secret(&self, secret_id: &str, value: &str) -> &Self {
        self.state
            .write()
            .unwrap()
            .secrets
            .insert(secret_id.to_string(), value.to_string());
        self
    }

    pub fn with_repository(&self, name: &str) -> &Self {
        self.state
            .write()
            .unwrap()
            .repositories
            .insert(name.to_string(), repository_uri(name));
        self
    }

    /// A repository another writer creates between our lookup and our create
    pub fn with_racing_repository(&self, name: &str) -> &Self {
        let mut state = self.state.write().unwrap();
        state
            .repositories
            .insert(name.to_string(), repository_uri(name));
        state.racing_repositories.insert(name.to_string());
        self
    }

    pub fn with_registry_token(&self, token: &str) -> &Self {
        self.state.write().unwrap().registry_token = token.to_string();
        self
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.state.read().unwrap().counts.clone()
    }

    /// Every create-bucket request in order, with its location constraint
    pub fn bucket_requests(&self) -> Vec<(String, Option<String>)> {
        self.state.read().unwrap().bucket_requests.clone()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .read()
            .unwrap()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys stored in a bucket, sorted
    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn secret(&self, secret_id: &str) -> Option<String> {
        self.state.read().unwrap().secrets.get(secret_id).cloned()
    }

    pub fn stacks(&self) -> Vec<StackRequest> {
        self.state.read().unwrap().stacks.clone()
    }

    fn check(&self, op: MockOp, count: impl FnOnce(&mut OperationCounts)) -> Result<()> {
        let mut state = self.state.write().unwrap();
        count(&mut state.counts);
        match state.failures.get(&op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

fn repository_uri(name: &str) -> String {
    format!("{}/{}", MOCK_REGISTRY, name)
}

#[async_trait]
impl IdentityService for MockCloud {
    async fn caller_account(&self) -> Result<String> {
        self.check(MockOp::Identity, |c| c.identity += 1)?;
        self.state
            .read()
            .unwrap()
            .account
            .clone()
            .ok_or_else(|| CloudError::Other("Unable to locate credentials".to_string()))
    }
}

#[async_trait]
impl ObjectStore for MockCloud {
    async fn create_bucket(&self, bucket: &str, location_constraint: Option<&str>) -> Result<()> {
        self.check(MockOp::CreateBucket, |c| c.create_bucket += 1)?;
        let mut state = self.state.write().unwrap();
        state
            .bucket_requests
            .push((bucket.to_string(), location_constraint.map(str::to_string)));

        if state.foreign_buckets.contains(bucket) {
            return Err(CloudError::AlreadyExists(format!(
                "bucket '{}' is owned by another account",
                bucket
            )));
        }
        if state.buckets.contains_key(bucket) {
            return Err(CloudError::AlreadyOwned(format!(
                "bucket '{}' already owned by you",
                bucket
            )));
        }
        state
            .buckets
            .insert(bucket.to_string(), location_constraint.map(str::to_string));
        Ok(())
    }

    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        self.check(MockOp::PutObject, |c| c.put_object += 1)?;
        let injected = self.state.read().unwrap().failing_keys.get(key).cloned();
        if let Some(error) = injected {
            return Err(error);
        }

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| CloudError::Other(format!("cannot read {}: {}", path.display(), e)))?;

        let mut state = self.state.write().unwrap();
        if !state.buckets.contains_key(bucket) {
            return Err(CloudError::NotFound(format!("bucket '{}'", bucket)));
        }
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), data);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.check(MockOp::GetObject, |c| c.get_object += 1)?;
        self.object(bucket, key)
            .ok_or_else(|| CloudError::NotFound(format!("s3://{}/{}", bucket, key)))
    }
}

#[async_trait]
impl ContainerRegistry for MockCloud {
    async fn repository_uri(&self, name: &str) -> Result<Option<String>> {
        self.check(MockOp::DescribeRepository, |c| c.describe_repository += 1)?;
        let mut state = self.state.write().unwrap();
        if state.racing_repositories.remove(name) {
            return Ok(None);
        }
        Ok(state.repositories.get(name).cloned())
    }

    async fn create_repository(&self, name: &str) -> Result<String> {
        self.check(MockOp::CreateRepository, |c| c.create_repository += 1)?;
        let mut state = self.state.write().unwrap();
        if state.repositories.contains_key(name) {
            return Err(CloudError::AlreadyExists(format!("repository '{}'", name)));
        }
        let uri = repository_uri(name);
        state.repositories.insert(name.to_string(), uri.clone());
        Ok(uri)
    }

    async fn authorization_token(&self) -> Result<RegistryToken> {
        self.check(MockOp::AuthorizationToken, |c| c.authorization_token += 1)?;
        Ok(RegistryToken {
            token: self.state.read().unwrap().registry_token.clone(),
            endpoint: format!("https://{}", MOCK_REGISTRY),
        })
    }
}

#[async_trait]
impl SecretStore for MockCloud {
    async fn put_secret_value(&self, secret_id: &str, value: &str) -> Result<()> {
        self.check(MockOp::PutSecretValue, |c| c.put_secret_value += 1)?;
        let mut state = self.state.write().unwrap();
        match state.secrets.get_mut(secret_id) {
            Some(current) => {
                *current = value.to_string();
                Ok(())
            }
            None => Err(CloudError::NotFound(format!("secret '{}'", secret_id))),
        }
    }

    async fn create_secret(&self, name: &str, value: &str) -> Result<()> {
        self.check(MockOp::CreateSecret, |c| c.create_secret += 1)?;
        let mut state = self.state.write().unwrap();
        if state.secrets.contains_key(name) {
            return Err(CloudError::AlreadyExists(format!("secret '{}'", name)));
        }
        state.secrets.insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn get_secret_string(&self, secret_id: &str) -> Result<String> {
        self.check(MockOp::GetSecret, |c| c.get_secret += 1)?;
        self.secret(secret_id)
            .ok_or_else(|| CloudError::NotFound(format!("secret '{}'", secret_id)))
    }
}

#[async_trait]
impl StackService for MockCloud {
    async fn create_stack(&self, request: &StackRequest) -> Result<String> {
        self.check(MockOp::CreateStack, |c| c.create_stack += 1)?;
        let mut state = self.state.write().unwrap();
        if state.stacks.iter().any(|s| s.stack_name == request.stack_name) {
            return Err(CloudError::AlreadyExists(format!(
                "stack '{}'",
                request.stack_name
            )));
        }
        state.stacks.push(request.clone());
        Ok(format!(
            "arn:aws:cloudformation:us-east-1:{}:stack/{}/mock",
            MOCK_ACCOUNT, request.stack_name
        ))
    }
}

//! Read-only access to per-client scope grants
//!
//! The authorizer never writes policy records; it looks up the scopes granted
//! to a principal and treats a missing record as a terminal deny.

pub mod cache;
#[cfg(feature = "dynamodb")]
pub mod dynamodb;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use crate::retry::Retryable;

pub use cache::CachedPolicyRepository;
#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbPolicyRepository;

/// How policy records are keyed in the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKeyShape {
    /// One record per client
    #[default]
    Client,
    /// One record per client and target API
    ClientAndApi,
}

/// Lookup key for a policy record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyKey {
    pub client_id: String,
    pub api_id: Option<String>,
}

impl PolicyKey {
    pub fn client(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            api_id: None,
        }
    }

    pub fn client_and_api(client_id: impl Into<String>, api_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            api_id: Some(api_id.into()),
        }
    }

    /// Build the key a deployment with `shape` uses for this request
    pub fn for_shape(shape: PolicyKeyShape, client_id: &str, api_id: &str) -> Self {
        match shape {
            PolicyKeyShape::Client => Self::client(client_id),
            PolicyKeyShape::ClientAndApi => Self::client_and_api(client_id, api_id),
        }
    }
}

impl std::fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.api_id {
            Some(api_id) => write!(f, "{}@{}", self.client_id, api_id),
            None => f.write_str(&self.client_id),
        }
    }
}

/// Scopes granted to one principal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub scopes: BTreeSet<String>,
}

impl PolicyRecord {
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn grants(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyLookupError {
    #[error("No policy record found")]
    NotFound,

    /// Timeouts, throttling and other faults worth retrying
    #[error("Policy store unavailable: {0}")]
    Unavailable(String),

    /// Permanent store faults such as a missing table or a malformed record
    #[error("Policy store failure: {0}")]
    Failed(String),
}

impl Retryable for PolicyLookupError {
    fn is_retryable(&self) -> bool {
        matches!(self, PolicyLookupError::Unavailable(_))
    }
}

/// Read path of the policy store
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    /// Scopes granted under `key`, or [`PolicyLookupError::NotFound`]
    async fn granted_scopes(&self, key: &PolicyKey) -> Result<PolicyRecord, PolicyLookupError>;
}

/// Policy repository held in process memory, for tests and local runs
#[derive(Debug, Default)]
pub struct InMemoryPolicyRepository {
    records: RwLock<HashMap<PolicyKey, PolicyRecord>>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, key: PolicyKey, record: PolicyRecord) -> Self {
        self.insert(key, record);
        self
    }

    pub fn insert(&self, key: PolicyKey, record: PolicyRecord) {
        if let Ok(mut records) = self.records.write() {
            records.insert(key, record);
        }
    }

    pub fn remove(&self, key: &PolicyKey) -> Option<PolicyRecord> {
        self.records.write().ok().and_then(|mut records| records.remove(key))
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn granted_scopes(&self, key: &PolicyKey) -> Result<PolicyRecord, PolicyLookupError> {
        let records = self
            .records
            .read()
            .map_err(|_| PolicyLookupError::Failed("in-memory policy store poisoned".to_string()))?;
        records.get(key).cloned().ok_or(PolicyLookupError::NotFound)
    }
}

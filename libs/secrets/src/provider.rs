//! Trait definition for lease providers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::SecretsError;

/// Result of a provider fetch or renew
///
/// A `Null` payload returned from `renew` keeps the payload the manager
/// already holds; only the lease metadata is refreshed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lease {
    pub data: Value,
    /// Validity window in seconds
    pub lease_duration: u64,
    /// Explicit renewability reported by the backend, if any
    pub renewable: Option<bool>,
    /// Absolute lifetime ceiling of the grant in seconds
    pub max_ttl: Option<u64>,
    /// Backend lease identifier (dynamic credentials)
    pub lease_id: Option<String>,
}

impl Lease {
    pub fn new(data: Value, lease_duration: u64) -> Self {
        Self {
            data,
            lease_duration,
            ..Default::default()
        }
    }

    pub fn with_renewable(mut self, renewable: bool) -> Self {
        self.renewable = Some(renewable);
        self
    }

    pub fn with_max_ttl(mut self, max_ttl: u64) -> Self {
        self.max_ttl = Some(max_ttl);
        self
    }

    pub fn with_lease_id(mut self, lease_id: impl Into<String>) -> Self {
        self.lease_id = Some(lease_id.into());
        self
    }
}

/// The categories of secret the agent knows how to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Token,
    Secret,
    Cubbyhole,
    Credential,
    Transit,
    Kms,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Token => "token",
            ProviderKind::Secret => "secret",
            ProviderKind::Cubbyhole => "cubbyhole",
            ProviderKind::Credential => "credential",
            ProviderKind::Transit => "transit",
            ProviderKind::Kms => "kms",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for lease providers
///
/// `initialize` is required. Renewal and invalidation are optional
/// capabilities: a provider that does not override `can_renew` is treated as
/// non-renewable regardless of any `renewable` flag in its results.
#[async_trait]
pub trait LeaseProvider: Send + Sync {
    /// Which category of secret this provider serves (for logging and keys)
    fn kind(&self) -> ProviderKind;

    /// Fetch the secret
    async fn initialize(&self) -> Result<Lease, SecretsError>;

    /// Whether this provider exposes a renew capability
    fn can_renew(&self) -> bool {
        false
    }

    /// Renew the lease on the secret
    async fn renew(&self) -> Result<Lease, SecretsError> {
        Err(SecretsError::NotRenewable(self.kind().to_string()))
    }

    /// Drop any adapter-local cached value so the next `initialize` re-fetches
    fn invalidate(&self) {}

    /// Upper bound on the renewal interval, if the backend enforces one
    fn renew_ceiling(&self) -> Option<Duration> {
        None
    }
}

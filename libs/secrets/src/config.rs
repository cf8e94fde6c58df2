//! Configuration for the registry and the Vault providers
//!
//! All values are passed explicitly to constructors; nothing here reads the
//! process environment.

use std::time::Duration;

use crate::lease_manager::{next_renewal_past_ceiling, ExpirationPolicy, DEFAULT_MIN_RENEW_INTERVAL};

/// Default time a lookup waits for a manager to become READY
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration for the manager registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum wait for a lookup to observe a READY manager
    pub timeout: Duration,
    /// Floor applied to every renewal interval
    pub min_renew_interval: Duration,
    /// When a renewed lease is considered too close to its grant ceiling
    pub expiration_policy: ExpirationPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOOKUP_TIMEOUT,
            min_renew_interval: DEFAULT_MIN_RENEW_INTERVAL,
            expiration_policy: next_renewal_past_ceiling,
        }
    }
}

impl RegistryConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration for talking to Vault
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault address (e.g., http://127.0.0.1:8200)
    pub addr: String,
    /// Increment requested when renewing the bootstrap token; also caps the
    /// bootstrap token's renewal interval
    pub token_renew_increment: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            addr: "http://127.0.0.1:8200".to_string(),
            token_renew_increment: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration for KMS decryption
#[derive(Debug, Clone)]
pub struct KmsConfig {
    /// Region used when a secret does not name one
    pub region: String,
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
        }
    }
}

/// Configuration for the bootstrap (attestation) exchange
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Instance metadata service base URL
    pub metadata_url: String,
    /// Warden endpoint that trades an identity document for a Vault token
    pub warden_url: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            metadata_url: "http://169.254.169.254".to_string(),
            warden_url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

impl BootstrapConfig {
    /// Instance-identity endpoint for `part` (document, signature, pkcs7)
    pub fn identity_url(&self, part: &str) -> String {
        format!(
            "{}/latest/dynamic/instance-identity/{part}",
            self.metadata_url.trim_end_matches('/')
        )
    }
}

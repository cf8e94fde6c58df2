//! Error types for the secrets library

use thiserror::Error;
use uuid::Uuid;

use crate::ProviderKind;

/// Errors that can occur while fetching, renewing or looking up secrets
#[derive(Error, Debug)]
pub enum SecretsError {
    /// Failed to connect to Vault, warden or the metadata service
    #[error("Failed to connect to secrets provider: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Secret not found
    #[error("Secret not found: {0}")]
    NotFound(String),

    /// Permission denied
    #[error("Permission denied for secret: {0}")]
    PermissionDenied(String),

    /// Invalid configuration or malformed secret descriptor
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("Failed to parse response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Rate limited
    #[error("Rate limited, retry after: {0}")]
    RateLimited(String),

    /// Renew was requested from a provider that cannot renew
    #[error("Provider '{0}' does not support renewal")]
    NotRenewable(String),

    /// The bootstrap token manager could not be made ready
    #[error("Bootstrap token unavailable: {0}")]
    BootstrapUnavailable(String),

    /// A lookup did not observe a ready manager in time
    #[error("timeout: '{event}' event for {kind} manager {correlation_id} after {waited_ms}ms")]
    Timeout {
        kind: ProviderKind,
        correlation_id: Uuid,
        event: &'static str,
        waited_ms: u64,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classes surfaced at the agent boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Provider-level failure (network, auth, not-found, backend-specific)
    Fetch,
    /// Lookup did not observe readiness within the bound
    Timeout,
    /// Malformed or missing construction arguments
    Configuration,
    /// The bootstrap token is not ready
    Bootstrap,
}

impl SecretsError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SecretsError::Timeout { .. } => ErrorClass::Timeout,
            SecretsError::InvalidConfig(_) => ErrorClass::Configuration,
            SecretsError::BootstrapUnavailable(_) => ErrorClass::Bootstrap,
            _ => ErrorClass::Fetch,
        }
    }

    /// Stable name used in the JSON error envelope
    pub fn name(&self) -> &'static str {
        match self.class() {
            ErrorClass::Fetch => "FetchError",
            ErrorClass::Timeout => "TimeoutError",
            ErrorClass::Configuration => "ConfigurationError",
            ErrorClass::Bootstrap => "BootstrapError",
        }
    }
}

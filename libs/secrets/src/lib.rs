//! # Secrets Agent Library
//!
//! Lease lifecycle management and lookup coordination for a host-local
//! secrets agent backed by Vault, with AWS KMS for envelope-encrypted secrets.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ManagerRegistry                         │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │  1. Make the bootstrap token manager READY          │   │
//! │  │  2. Find or create the LeaseManager for the key     │   │
//! │  │  3. Wait (bounded) for it to become READY           │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                           │                                 │
//! │        LeaseManager ── renewal timer ── LeaseProvider       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use secrets::providers::VaultProviderFactory;
//! use secrets::{BootstrapConfig, ManagerRegistry, ProviderKind, RegistryConfig, VaultConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), secrets::SecretsError> {
//!     let factory = VaultProviderFactory::new(VaultConfig::default(), BootstrapConfig::default())?;
//!     let registry = ManagerRegistry::new(Arc::new(factory), RegistryConfig::default());
//!
//!     let result = registry
//!         .lookup("default", &"app/db".into(), ProviderKind::Secret)
//!         .await?;
//!     println!("{} {}", result.correlation_id, result.data);
//!     Ok(())
//! }
//! ```

mod cache_key;
mod config;
mod duration;
mod error;
mod lease_manager;
mod provider;
mod registry;
mod wait;

pub mod providers;

pub use cache_key::{cache_key, SecretDescriptor};
pub use config::{
    BootstrapConfig, KmsConfig, RegistryConfig, VaultConfig, DEFAULT_LOOKUP_TIMEOUT,
};
pub use duration::{parse_duration, parse_seconds};
pub use error::{ErrorClass, SecretsError};
pub use lease_manager::{
    next_renewal_past_ceiling, ExpirationPolicy, LeaseManager, LeaseSnapshot, ManagerEvent,
    ManagerObserver, ManagerStatus, DEFAULT_MIN_RENEW_INTERVAL,
};
pub use provider::{Lease, LeaseProvider, ProviderKind};
pub use registry::{
    LoggingObserver, LookupResult, ManagerRegistry, ProviderFactory, SecretLookup, TokenHealth,
    DEFAULT_TOKEN_KEY,
};
pub use wait::{once_with_timeout, WaitError};

//! Manager registry: the single lookup point for secrets
//!
//! The registry owns every renewable [`LeaseManager`], keyed by
//! [`cache_key`]. It makes sure the bootstrap token is READY before any
//! dependent secret is fetched, coalesces concurrent lookups for the same key
//! onto one manager, and bounds how long a lookup waits for readiness.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::cache_key::{cache_key, SecretDescriptor};
use crate::config::RegistryConfig;
use crate::lease_manager::{LeaseManager, ManagerEvent, ManagerObserver};
use crate::{LeaseProvider, ProviderKind, SecretsError};

/// Key of the bootstrap token manager
pub const DEFAULT_TOKEN_KEY: &str = "/token/default/default";

/// Builds providers for the registry
pub trait ProviderFactory: Send + Sync {
    /// The provider that obtains the agent's own bootstrap token
    fn bootstrap(&self) -> Result<Arc<dyn LeaseProvider>, SecretsError>;

    /// A provider for `descriptor`, authenticated with the bootstrap `token`
    fn create(
        &self,
        kind: ProviderKind,
        token: &str,
        descriptor: &SecretDescriptor,
    ) -> Result<Arc<dyn LeaseProvider>, SecretsError>;
}

/// Data returned to a lookup caller, tagged with the manager's correlation id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupResult {
    pub data: Value,
    pub correlation_id: Uuid,
}

/// Readiness of the bootstrap token, for health reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenHealth {
    Ready,
    NotReady,
    NoTokenData,
    Failed(String),
}

/// Lookup seam used by the HTTP layer
#[async_trait]
pub trait SecretLookup: Send + Sync {
    async fn lookup(
        &self,
        token: &str,
        descriptor: &SecretDescriptor,
        kind: ProviderKind,
    ) -> Result<LookupResult, SecretsError>;

    async fn token_health(&self) -> TokenHealth;
}

/// Logs every manager transition with its provider, status, lease and
/// correlation id
pub struct LoggingObserver;

impl ManagerObserver for LoggingObserver {
    fn on_event(&self, manager: &LeaseManager, event: &ManagerEvent) {
        let provider = manager.provider_kind();
        let status = manager.status();
        let lease_duration = manager.lease_duration();
        let correlation_id = manager.correlation_id();

        match event {
            ManagerEvent::Ready => info!(
                %provider, ?status, lease_duration, %correlation_id,
                "Manager is ready"
            ),
            ManagerEvent::Renewed => info!(
                %provider, ?status, lease_duration, %correlation_id,
                "Manager renewed provider's data"
            ),
            ManagerEvent::Error(message) => error!(
                %provider, ?status, lease_duration, %correlation_id, error = %message,
                "Manager failed"
            ),
            ManagerEvent::Invalidated => info!(
                %provider, ?status, lease_duration, %correlation_id,
                "Invalidating manager due to expiration"
            ),
        }
    }
}

pub struct ManagerRegistry {
    factory: Arc<dyn ProviderFactory>,
    config: RegistryConfig,
    managers: Mutex<HashMap<String, Arc<LeaseManager>>>,
    default_token: Mutex<Option<Arc<LeaseManager>>>,
}

impl ManagerRegistry {
    pub fn new(factory: Arc<dyn ProviderFactory>, config: RegistryConfig) -> Self {
        Self {
            factory,
            config,
            managers: Mutex::new(HashMap::new()),
            default_token: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Number of indexed managers, the bootstrap manager included
    pub fn len(&self) -> usize {
        self.managers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.lock().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.managers.lock().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Arc<LeaseManager>> {
        self.managers.lock().get(key).cloned()
    }

    /// The bootstrap token manager, created on first access
    pub fn default_token(&self) -> Result<Arc<LeaseManager>, SecretsError> {
        let mut slot = self.default_token.lock();
        if let Some(manager) = slot.as_ref() {
            return Ok(Arc::clone(manager));
        }

        let provider = self.factory.bootstrap()?;
        let manager = self.build_manager(DEFAULT_TOKEN_KEY, provider);
        self.managers
            .lock()
            .insert(DEFAULT_TOKEN_KEY.to_string(), Arc::clone(&manager));
        *slot = Some(Arc::clone(&manager));

        Ok(manager)
    }

    /// Current data for a secret, waiting up to the configured timeout for
    /// its manager to become READY.
    ///
    /// The timeout bounds the whole call, bootstrap wait included.
    pub async fn lookup(
        &self,
        token: &str,
        descriptor: &SecretDescriptor,
        kind: ProviderKind,
    ) -> Result<LookupResult, SecretsError> {
        let deadline = self.deadline();
        let bootstrap = self.ready_default_token(deadline).await?;
        if kind == ProviderKind::Token {
            return Ok(Self::result(&bootstrap, bootstrap_data(&bootstrap)?));
        }

        let vault_token = bootstrap_token(&bootstrap)?;
        let key = cache_key(kind, token, descriptor);
        let manager = self.resolve_manager(&key, kind, &vault_token, descriptor)?;

        if let Some(data) = manager.ready_data() {
            log_manager("Manager was able to lookup a secret", &manager);
            self.release_if_ephemeral(&key, &manager);
            return Ok(Self::result(&manager, data));
        }

        match manager.wait_ready(remaining(deadline)).await {
            Ok(data) => {
                log_manager("Manager was able to lookup a secret", &manager);
                self.release_if_ephemeral(&key, &manager);
                Ok(Self::result(&manager, data))
            }
            Err(err) => {
                error!(
                    provider = %manager.provider_kind(),
                    status = ?manager.status(),
                    correlation_id = %manager.correlation_id(),
                    last_error = ?manager.last_error(),
                    error = %err,
                    "Lookup did not observe a ready manager"
                );
                self.evict(&key, &manager);
                Err(SecretsError::Timeout {
                    kind,
                    correlation_id: manager.correlation_id(),
                    event: "ready",
                    waited_ms: self.config.timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Readiness of the bootstrap token, waiting at most the lookup timeout
    pub async fn token_health(&self) -> TokenHealth {
        let manager = match self.default_token() {
            Ok(manager) => manager,
            Err(err) => return TokenHealth::Failed(err.to_string()),
        };

        manager.start_initialize();
        if manager.wait_ready(self.config.timeout).await.is_err() {
            return match manager.last_error() {
                Some(err) => TokenHealth::Failed(err),
                None => TokenHealth::NotReady,
            };
        }

        match manager.ready_data() {
            None => TokenHealth::NotReady,
            Some(data) if token_of(&data).is_none() => TokenHealth::NoTokenData,
            Some(_) => TokenHealth::Ready,
        }
    }

    /// End of a lookup's wait budget; `None` when the timeout is disabled
    fn deadline(&self) -> Option<Instant> {
        if self.config.timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + self.config.timeout)
        }
    }

    async fn ready_default_token(
        &self,
        deadline: Option<Instant>,
    ) -> Result<Arc<LeaseManager>, SecretsError> {
        let manager = self.default_token()?;
        if manager.ready_data().is_some() {
            return Ok(manager);
        }

        manager.start_initialize();
        match manager.wait_ready(remaining(deadline)).await {
            Ok(_) => Ok(manager),
            Err(err) => Err(SecretsError::BootstrapUnavailable(
                manager.last_error().unwrap_or_else(|| err.to_string()),
            )),
        }
    }

    fn resolve_manager(
        &self,
        key: &str,
        kind: ProviderKind,
        vault_token: &str,
        descriptor: &SecretDescriptor,
    ) -> Result<Arc<LeaseManager>, SecretsError> {
        let mut managers = self.managers.lock();

        if let Some(existing) = managers.get(key) {
            let manager = Arc::clone(existing);
            drop(managers);
            log_manager("Retrieved LeaseManager", &manager);
            manager.start_initialize();
            return Ok(manager);
        }

        let provider = self.factory.create(kind, vault_token, descriptor)?;
        let manager = self.build_manager(key, provider);

        // non-renewable providers are rebuilt per lookup: a cached single-shot
        // result would never be refreshed
        if manager.is_renewable() {
            managers.insert(key.to_string(), Arc::clone(&manager));
        }
        drop(managers);

        manager.start_initialize();
        Ok(manager)
    }

    fn build_manager(&self, key: &str, provider: Arc<dyn LeaseProvider>) -> Arc<LeaseManager> {
        let manager = Arc::new(
            LeaseManager::new(key, provider)
                .with_min_interval(self.config.min_renew_interval)
                .with_expiration_policy(self.config.expiration_policy),
        );
        manager.add_observer(Arc::new(LoggingObserver));
        log_manager("Created LeaseManager", &manager);
        manager
    }

    /// Drop `manager` from the index if `key` still maps to it
    fn evict(&self, key: &str, manager: &Arc<LeaseManager>) {
        if key == DEFAULT_TOKEN_KEY {
            return;
        }

        let mut managers = self.managers.lock();
        if managers
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, manager))
        {
            managers.remove(key);
            debug!(provider = %manager.provider_kind(), correlation_id = %manager.correlation_id(), "Evicted LeaseManager");
        }
    }

    fn release_if_ephemeral(&self, key: &str, manager: &Arc<LeaseManager>) {
        if !manager.is_renewable() {
            self.evict(key, manager);
        }
    }

    fn result(manager: &LeaseManager, data: Value) -> LookupResult {
        LookupResult {
            data,
            correlation_id: manager.correlation_id(),
        }
    }
}

#[async_trait]
impl SecretLookup for ManagerRegistry {
    async fn lookup(
        &self,
        token: &str,
        descriptor: &SecretDescriptor,
        kind: ProviderKind,
    ) -> Result<LookupResult, SecretsError> {
        ManagerRegistry::lookup(self, token, descriptor, kind).await
    }

    async fn token_health(&self) -> TokenHealth {
        ManagerRegistry::token_health(self).await
    }
}

/// Wait budget left before `deadline`. Never zero while bounded, since a
/// zero wait is unbounded.
fn remaining(deadline: Option<Instant>) -> Duration {
    match deadline {
        Some(deadline) => deadline
            .saturating_duration_since(Instant::now())
            .max(Duration::from_millis(1)),
        None => Duration::ZERO,
    }
}

fn log_manager(message: &str, manager: &LeaseManager) {
    info!(
        provider = %manager.provider_kind(),
        status = ?manager.status(),
        lease_duration = manager.lease_duration(),
        correlation_id = %manager.correlation_id(),
        "{message}"
    );
}

fn token_of(data: &Value) -> Option<&str> {
    data.get("token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
}

fn bootstrap_data(manager: &LeaseManager) -> Result<Value, SecretsError> {
    manager
        .ready_data()
        .ok_or_else(|| SecretsError::BootstrapUnavailable("Manager is not ready.".to_string()))
}

fn bootstrap_token(manager: &LeaseManager) -> Result<String, SecretsError> {
    let data = bootstrap_data(manager)?;
    token_of(&data)
        .map(str::to_string)
        .ok_or_else(|| SecretsError::BootstrapUnavailable("No token data.".to_string()))
}

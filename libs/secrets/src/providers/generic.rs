//! Static secrets read from a Vault key/value mount
//!
//! Key/value secrets are persistent, so "renewing" one simply re-reads it once
//! its TTL window has passed. Reads are cached until the provider is
//! invalidated.

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::Secret;
use tracing::debug;

use super::vault::{checked_path, VaultClient};
use crate::{Lease, LeaseProvider, ProviderKind, SecretsError};

pub struct GenericProvider {
    client: VaultClient,
    token: Secret<String>,
    kind: ProviderKind,
    path: String,
    cached: Mutex<Option<Lease>>,
}

impl GenericProvider {
    /// Provider for `secret/{path}`
    pub fn secret(client: VaultClient, path: &str, token: &str) -> Result<Self, SecretsError> {
        Self::new(client, ProviderKind::Secret, "secret", path, token)
    }

    /// Provider for `cubbyhole/{path}`
    pub fn cubbyhole(client: VaultClient, path: &str, token: &str) -> Result<Self, SecretsError> {
        Self::new(client, ProviderKind::Cubbyhole, "cubbyhole", path, token)
    }

    fn new(
        client: VaultClient,
        kind: ProviderKind,
        mount: &str,
        path: &str,
        token: &str,
    ) -> Result<Self, SecretsError> {
        let path = checked_path(path)?;
        if token.is_empty() {
            return Err(SecretsError::InvalidConfig("token is required".to_string()));
        }

        Ok(Self {
            client,
            token: Secret::new(token.to_string()),
            kind,
            path: format!("{mount}/{path}"),
            cached: Mutex::new(None),
        })
    }

    /// Full Vault path, mount included
    pub fn path(&self) -> &str {
        &self.path
    }

    async fn retrieve(&self) -> Result<Lease, SecretsError> {
        let response = self.client.read(&self.token, &self.path).await?;
        let mut lease = response.into_lease();
        // without a TTL there is nothing to re-read on a schedule
        if lease.lease_duration == 0 {
            lease = lease.with_renewable(false);
        }

        debug!(path = %self.path, lease_duration = lease.lease_duration, "Read secret");
        *self.cached.lock() = Some(lease.clone());
        Ok(lease)
    }
}

#[async_trait]
impl LeaseProvider for GenericProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn initialize(&self) -> Result<Lease, SecretsError> {
        let cached = self.cached.lock().clone();
        if let Some(lease) = cached {
            return Ok(lease);
        }
        self.retrieve().await
    }

    fn can_renew(&self) -> bool {
        true
    }

    async fn renew(&self) -> Result<Lease, SecretsError> {
        self.retrieve().await
    }

    fn invalidate(&self) {
        self.cached.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VaultConfig;

    fn client() -> VaultClient {
        VaultClient::new(&VaultConfig::default()).unwrap()
    }

    #[test]
    fn test_paths_include_mount() {
        let secret = GenericProvider::secret(client(), "app/db", "T").unwrap();
        assert_eq!(secret.path(), "secret/app/db");
        assert_eq!(secret.kind(), ProviderKind::Secret);

        let cubbyhole = GenericProvider::cubbyhole(client(), "/my-key", "T").unwrap();
        assert_eq!(cubbyhole.path(), "cubbyhole/my-key");
        assert_eq!(cubbyhole.kind(), ProviderKind::Cubbyhole);
    }

    #[test]
    fn test_requires_path_and_token() {
        assert!(matches!(
            GenericProvider::secret(client(), "", "T"),
            Err(SecretsError::InvalidConfig(msg)) if msg == "path is required"
        ));
        assert!(matches!(
            GenericProvider::cubbyhole(client(), "key", ""),
            Err(SecretsError::InvalidConfig(msg)) if msg == "token is required"
        ));
    }

    #[test]
    fn test_rejects_paths_leaving_the_mount() {
        for path in ["../auth/token/lookup-self", "app/../../sys/leases", "app//db"] {
            assert!(matches!(
                GenericProvider::secret(client(), path, "T"),
                Err(SecretsError::InvalidConfig(_))
            ));
            assert!(matches!(
                GenericProvider::cubbyhole(client(), path, "T"),
                Err(SecretsError::InvalidConfig(_))
            ));
        }
    }
}

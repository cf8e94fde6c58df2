//! Dynamic credentials from a Vault secrets engine (`{mount}/creds/{role}`)

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Method;
use secrecy::Secret;
use serde_json::{json, Value};
use tracing::debug;

use super::vault::{checked_path, VaultClient};
use crate::{Lease, LeaseProvider, ProviderKind, SecretsError};

pub struct CredentialProvider {
    client: VaultClient,
    token: Secret<String>,
    mount: String,
    role: String,
    lease_id: Mutex<Option<String>>,
}

impl CredentialProvider {
    /// `path` is `mount/role`
    pub fn new(client: VaultClient, path: &str, token: &str) -> Result<Self, SecretsError> {
        let (mount, role) = checked_path(path)?
            .split_once('/')
            .filter(|(mount, role)| !mount.is_empty() && !role.is_empty() && !role.contains('/'))
            .ok_or_else(|| {
                SecretsError::InvalidConfig(format!("credential path must be mount/role, got '{path}'"))
            })?;
        if token.is_empty() {
            return Err(SecretsError::InvalidConfig("token is required".to_string()));
        }

        Ok(Self {
            client,
            token: Secret::new(token.to_string()),
            mount: mount.to_string(),
            role: role.to_string(),
            lease_id: Mutex::new(None),
        })
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    fn to_lease(response: super::vault::VaultResponse) -> Lease {
        let renewable = response.renewable;
        response.into_lease().with_renewable(renewable)
    }
}

#[async_trait]
impl LeaseProvider for CredentialProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Credential
    }

    async fn initialize(&self) -> Result<Lease, SecretsError> {
        let path = format!("{}/creds/{}", self.mount, self.role);
        let lease = Self::to_lease(self.client.read(&self.token, &path).await?);

        debug!(mount = %self.mount, role = %self.role, lease_duration = lease.lease_duration, "Issued credentials");
        *self.lease_id.lock() = lease.lease_id.clone();
        Ok(lease)
    }

    fn can_renew(&self) -> bool {
        true
    }

    async fn renew(&self) -> Result<Lease, SecretsError> {
        let lease_id = self.lease_id.lock().clone().ok_or_else(|| {
            SecretsError::NotRenewable(format!("{}/{} has no lease", self.mount, self.role))
        })?;

        let response = self
            .client
            .write(
                Method::PUT,
                &self.token,
                "sys/leases/renew",
                &json!({ "lease_id": lease_id }),
            )
            .await?;

        // renewal only extends the lease; the issued credentials stay the same
        let mut lease = Self::to_lease(response);
        lease.data = Value::Null;
        Ok(lease)
    }

    fn invalidate(&self) {
        self.lease_id.lock().take();
    }
}

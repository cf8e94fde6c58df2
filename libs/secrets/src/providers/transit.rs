//! Decryption through Vault's transit backend
//!
//! See: https://developer.hashicorp.com/vault/api-docs/secret/transit#decrypt-data

use async_trait::async_trait;
use reqwest::Method;
use secrecy::Secret;
use serde_json::json;

use super::vault::VaultClient;
use crate::{Lease, LeaseProvider, ProviderKind, SecretDescriptor, SecretsError};

#[derive(Debug)]
pub struct TransitProvider {
    client: VaultClient,
    token: Secret<String>,
    key: String,
    ciphertext: String,
}

impl TransitProvider {
    /// `descriptor` must carry non-empty `key` and `ciphertext` fields
    pub fn new(
        client: VaultClient,
        descriptor: &SecretDescriptor,
        token: &str,
    ) -> Result<Self, SecretsError> {
        let key = descriptor
            .field("key")
            .ok_or_else(|| SecretsError::InvalidConfig("secret.key is required".to_string()))?;
        if key.contains('/') || key == "." || key == ".." {
            return Err(SecretsError::InvalidConfig(format!(
                "secret.key '{key}' is not a key name"
            )));
        }
        let ciphertext = descriptor.field("ciphertext").ok_or_else(|| {
            SecretsError::InvalidConfig("secret.ciphertext is required".to_string())
        })?;
        if token.is_empty() {
            return Err(SecretsError::InvalidConfig("token is required".to_string()));
        }

        Ok(Self {
            client,
            token: Secret::new(token.to_string()),
            key: key.to_string(),
            ciphertext: ciphertext.to_string(),
        })
    }
}

#[async_trait]
impl LeaseProvider for TransitProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Transit
    }

    async fn initialize(&self) -> Result<Lease, SecretsError> {
        let response = self
            .client
            .write(
                Method::POST,
                &self.token,
                &format!("transit/decrypt/{}", self.key),
                &json!({ "ciphertext": self.ciphertext }),
            )
            .await?;

        Ok(Lease::new(response.data, response.lease_duration).with_renewable(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VaultConfig;
    use serde_json::Map;

    fn client() -> VaultClient {
        VaultClient::new(&VaultConfig::default()).unwrap()
    }

    fn descriptor(key: &str, ciphertext: &str) -> SecretDescriptor {
        let mut fields = Map::new();
        fields.insert("key".to_string(), json!(key));
        fields.insert("ciphertext".to_string(), json!(ciphertext));
        SecretDescriptor::from(fields)
    }

    #[test]
    fn test_requires_key_and_ciphertext() {
        let err = TransitProvider::new(client(), &descriptor("", "vault:v1:abc"), "T").unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration: secret.key is required");

        let err = TransitProvider::new(client(), &descriptor("app", ""), "T").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: secret.ciphertext is required"
        );

        let err = TransitProvider::new(client(), &descriptor("../../sys/seal", "c"), "T").unwrap_err();
        assert!(matches!(err, SecretsError::InvalidConfig(_)));

        let err = TransitProvider::new(client(), &"app".into(), "T").unwrap_err();
        assert!(matches!(err, SecretsError::InvalidConfig(_)));
    }

    #[test]
    fn test_is_not_renewable() {
        let provider = TransitProvider::new(client(), &descriptor("app", "vault:v1:abc"), "T").unwrap();
        assert!(!provider.can_renew());
    }
}

//! Builds Vault-backed and KMS providers for the registry

use std::sync::Arc;

use super::{
    AwsKmsClient, CredentialProvider, GenericProvider, KmsDecrypt, KmsProvider, TokenProvider,
    TransitProvider, VaultClient,
};
use crate::{
    BootstrapConfig, KmsConfig, LeaseProvider, ProviderFactory, ProviderKind, SecretDescriptor,
    SecretsError, VaultConfig,
};

pub struct VaultProviderFactory {
    client: VaultClient,
    vault: VaultConfig,
    bootstrap: BootstrapConfig,
    kms: Arc<dyn KmsDecrypt>,
    kms_config: KmsConfig,
}

impl VaultProviderFactory {
    pub fn new(vault: VaultConfig, bootstrap: BootstrapConfig) -> Result<Self, SecretsError> {
        Ok(Self {
            client: VaultClient::new(&vault)?,
            vault,
            bootstrap,
            kms: Arc::new(AwsKmsClient::new()),
            kms_config: KmsConfig::default(),
        })
    }

    /// Use `client` for KMS decryption, with `config.region` as the default
    /// region
    pub fn with_kms(mut self, client: Arc<dyn KmsDecrypt>, config: KmsConfig) -> Self {
        self.kms = client;
        self.kms_config = config;
        self
    }
}

fn required_path(descriptor: &SecretDescriptor) -> Result<&str, SecretsError> {
    descriptor
        .as_path()
        .ok_or_else(|| SecretsError::InvalidConfig("path is required".to_string()))
}

impl ProviderFactory for VaultProviderFactory {
    fn bootstrap(&self) -> Result<Arc<dyn LeaseProvider>, SecretsError> {
        Ok(Arc::new(TokenProvider::new(
            self.client.clone(),
            &self.vault,
            self.bootstrap.clone(),
        )?))
    }

    fn create(
        &self,
        kind: ProviderKind,
        token: &str,
        descriptor: &SecretDescriptor,
    ) -> Result<Arc<dyn LeaseProvider>, SecretsError> {
        let client = self.client.clone();
        let provider: Arc<dyn LeaseProvider> = match kind {
            ProviderKind::Token => return self.bootstrap(),
            ProviderKind::Secret => {
                Arc::new(GenericProvider::secret(client, required_path(descriptor)?, token)?)
            }
            ProviderKind::Cubbyhole => Arc::new(GenericProvider::cubbyhole(
                client,
                required_path(descriptor)?,
                token,
            )?),
            ProviderKind::Credential => Arc::new(CredentialProvider::new(
                client,
                required_path(descriptor)?,
                token,
            )?),
            ProviderKind::Transit => Arc::new(TransitProvider::new(client, descriptor, token)?),
            ProviderKind::Kms => Arc::new(KmsProvider::new(
                Arc::clone(&self.kms),
                descriptor,
                &self.kms_config.region,
            )?),
        };
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> VaultProviderFactory {
        VaultProviderFactory::new(VaultConfig::default(), BootstrapConfig::default()).unwrap()
    }

    #[test]
    fn test_creates_provider_per_kind() {
        let factory = factory();

        for (kind, descriptor) in [
            (ProviderKind::Secret, "app/db"),
            (ProviderKind::Cubbyhole, "key"),
            (ProviderKind::Credential, "database/readonly"),
        ] {
            let provider = factory.create(kind, "T", &descriptor.into()).unwrap();
            assert_eq!(provider.kind(), kind);
        }

        assert_eq!(factory.bootstrap().unwrap().kind(), ProviderKind::Token);
    }

    #[test]
    fn test_structured_descriptor_is_not_a_path() {
        let descriptor: SecretDescriptor =
            serde_json::from_value(serde_json::json!({"key": "k", "ciphertext": "c"})).unwrap();

        assert!(factory()
            .create(ProviderKind::Secret, "T", &descriptor)
            .is_err());
        assert_eq!(
            factory()
                .create(ProviderKind::Transit, "T", &descriptor)
                .unwrap()
                .kind(),
            ProviderKind::Transit
        );
    }

    #[test]
    fn test_kms_uses_configured_region() {
        let factory = factory().with_kms(
            Arc::new(AwsKmsClient::new()),
            KmsConfig {
                region: "eu-west-1".to_string(),
            },
        );
        let descriptor: SecretDescriptor =
            serde_json::from_value(serde_json::json!({"ciphertext": "Zm9v"})).unwrap();

        let provider = factory.create(ProviderKind::Kms, "T", &descriptor).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Kms);
        assert!(!provider.can_renew());

        let missing = serde_json::from_value(serde_json::json!({"region": "eu-west-1"})).unwrap();
        assert!(matches!(
            factory.create(ProviderKind::Kms, "T", &missing),
            Err(SecretsError::InvalidConfig(_))
        ));
    }
}

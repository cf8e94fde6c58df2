//! Vault-backed provider implementations, plus KMS decryption

mod credential;
mod factory;
mod generic;
mod kms;
mod token;
mod transit;
mod vault;

pub use credential::CredentialProvider;
pub use factory::VaultProviderFactory;
pub use generic::GenericProvider;
pub use kms::{AwsKmsClient, KmsDecrypt, KmsPlaintext, KmsProvider};
pub use token::TokenProvider;
pub use transit::TransitProvider;
pub use vault::{VaultAuth, VaultClient, VaultResponse};

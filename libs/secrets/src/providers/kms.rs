//! Envelope-encrypted secrets decrypted with AWS KMS
//!
//! The ciphertext arrives base64-encoded in the secret descriptor. The
//! decrypted result keeps the KMS field names (`KeyId`, `Plaintext`) with the
//! plaintext base64-encoded; the HTTP layer normalizes both.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_kms::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kms::operation::decrypt::DecryptError;
use aws_sdk_kms::primitives::Blob;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::{Lease, LeaseProvider, ProviderKind, SecretDescriptor, SecretsError};

/// Output of a KMS decrypt call
#[derive(Debug, Clone, PartialEq)]
pub struct KmsPlaintext {
    pub key_id: Option<String>,
    pub plaintext: Vec<u8>,
}

/// Decrypt capability, split out so the provider can run against a fake
#[async_trait]
pub trait KmsDecrypt: Send + Sync {
    async fn decrypt(&self, region: &str, ciphertext: Vec<u8>)
        -> Result<KmsPlaintext, SecretsError>;
}

/// KMS client backed by the AWS SDK, one SDK client per region
#[derive(Default)]
pub struct AwsKmsClient {
    clients: Mutex<HashMap<String, aws_sdk_kms::Client>>,
}

impl AwsKmsClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self, region: &str) -> aws_sdk_kms::Client {
        let cached = self.clients.lock().get(region).cloned();
        if let Some(client) = cached {
            return client;
        }

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        let client = aws_sdk_kms::Client::new(&sdk_config);

        self.clients
            .lock()
            .entry(region.to_string())
            .or_insert(client)
            .clone()
    }
}

#[async_trait]
impl KmsDecrypt for AwsKmsClient {
    async fn decrypt(
        &self,
        region: &str,
        ciphertext: Vec<u8>,
    ) -> Result<KmsPlaintext, SecretsError> {
        let output = self
            .client(region)
            .await
            .decrypt()
            .ciphertext_blob(Blob::new(ciphertext))
            .send()
            .await
            .map_err(map_decrypt_error)?;

        let plaintext = output
            .plaintext()
            .ok_or_else(|| {
                SecretsError::Internal("KMS decrypt response contained no plaintext".to_string())
            })?
            .as_ref()
            .to_vec();

        Ok(KmsPlaintext {
            key_id: output.key_id().map(str::to_string),
            plaintext,
        })
    }
}

fn map_decrypt_error(err: SdkError<DecryptError>) -> SecretsError {
    if matches!(err, SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)) {
        return SecretsError::ConnectionFailed(DisplayErrorContext(&err).to_string());
    }

    let code = err.code().unwrap_or("KMSError").to_string();
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    match code.as_str() {
        "AccessDeniedException" => SecretsError::PermissionDenied(message),
        "NotFoundException" => SecretsError::NotFound(message),
        "ThrottlingException" | "LimitExceededException" => SecretsError::RateLimited(message),
        "UnrecognizedClientException" | "InvalidSignatureException" | "ExpiredTokenException" => {
            SecretsError::AuthenticationFailed(message)
        }
        _ => SecretsError::Internal(format!("{code}: {message}")),
    }
}

pub struct KmsProvider {
    client: Arc<dyn KmsDecrypt>,
    region: String,
    ciphertext: Vec<u8>,
}

impl KmsProvider {
    /// `descriptor` must carry a base64 `ciphertext`; `region` falls back to
    /// `default_region`
    pub fn new(
        client: Arc<dyn KmsDecrypt>,
        descriptor: &SecretDescriptor,
        default_region: &str,
    ) -> Result<Self, SecretsError> {
        let encoded = descriptor.field("ciphertext").ok_or_else(|| {
            SecretsError::InvalidConfig("secret.ciphertext is required".to_string())
        })?;
        let ciphertext = STANDARD.decode(encoded).map_err(|e| {
            SecretsError::InvalidConfig(format!("secret.ciphertext is not base64: {e}"))
        })?;

        let region = descriptor
            .field("region")
            .unwrap_or(default_region)
            .trim();
        if region.is_empty() {
            return Err(SecretsError::InvalidConfig(
                "secret.region is required".to_string(),
            ));
        }

        Ok(Self {
            client,
            region: region.to_string(),
            ciphertext,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl LeaseProvider for KmsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Kms
    }

    async fn initialize(&self) -> Result<Lease, SecretsError> {
        let decrypted = self
            .client
            .decrypt(&self.region, self.ciphertext.clone())
            .await?;

        debug!(region = %self.region, key_id = ?decrypted.key_id, "Decrypted KMS secret");
        let data = json!({
            "KeyId": decrypted.key_id,
            "Plaintext": STANDARD.encode(&decrypted.plaintext),
        });
        Ok(Lease::new(data, 0).with_renewable(false))
    }
}

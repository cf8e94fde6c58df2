//! Bootstrap token provider
//!
//! The agent proves its identity by sending the instance-identity document,
//! signature and PKCS7 blob from the metadata service to the warden, which
//! answers with a Vault token. The token is then kept alive through
//! `auth/token/renew-self`.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::vault::VaultClient;
use crate::{BootstrapConfig, Lease, LeaseProvider, ProviderKind, SecretsError, VaultConfig};

/// Warden reply to an identity exchange
#[derive(Debug, Deserialize)]
struct WardenResponse {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    lease_duration: u64,
    creation_time: Option<String>,
    expiration_time: Option<String>,
}

impl WardenResponse {
    /// Lifetime of the grant, when the warden reports both ends of it
    fn max_ttl(&self) -> Option<u64> {
        let created = parse_timestamp(self.creation_time.as_deref()?)?;
        let expires = parse_timestamp(self.expiration_time.as_deref()?)?;
        u64::try_from((expires - created).num_seconds()).ok()
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

pub struct TokenProvider {
    http: Client,
    vault: VaultClient,
    bootstrap: BootstrapConfig,
    renew_increment: Duration,
    token: Mutex<Option<Secret<String>>>,
}

impl TokenProvider {
    pub fn new(
        vault: VaultClient,
        vault_config: &VaultConfig,
        bootstrap: BootstrapConfig,
    ) -> Result<Self, SecretsError> {
        if bootstrap.warden_url.trim().is_empty() {
            return Err(SecretsError::InvalidConfig(
                "warden URL is required".to_string(),
            ));
        }
        if bootstrap.metadata_url.trim().is_empty() {
            return Err(SecretsError::InvalidConfig(
                "metadata URL is required".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(vault_config.request_timeout)
            .build()
            .map_err(|e| SecretsError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            http,
            vault,
            bootstrap,
            renew_increment: vault_config.token_renew_increment,
            token: Mutex::new(None),
        })
    }

    async fn identity(&self, part: &str) -> Result<String, SecretsError> {
        let url = self.bootstrap.identity_url(part);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SecretsError::ConnectionFailed(format!("metadata service: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SecretsError::Internal(format!(
                "metadata service returned HTTP {status} for {part}"
            )));
        }
        Ok(response.text().await?)
    }

    async fn exchange(&self) -> Result<WardenResponse, SecretsError> {
        let (document, signature, pkcs7) = tokio::try_join!(
            self.identity("document"),
            self.identity("signature"),
            self.identity("pkcs7"),
        )?;
        let document: Value = serde_json::from_str(&document)?;

        let response = self
            .http
            .post(&self.bootstrap.warden_url)
            .json(&json!({
                "document": document,
                "signature": signature,
                "pkcs7": pkcs7,
            }))
            .send()
            .await
            .map_err(|e| SecretsError::ConnectionFailed(format!("warden: {e}")))?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                Err(SecretsError::AuthenticationFailed(format!(
                    "warden rejected identity document: {body}"
                )))
            }
            status => Err(SecretsError::Internal(format!(
                "warden returned HTTP {status}"
            ))),
        }
    }

    fn current_token(&self) -> Result<Secret<String>, SecretsError> {
        self.token
            .lock()
            .as_ref()
            .map(|token| Secret::new(token.expose_secret().clone()))
            .ok_or_else(|| SecretsError::NotRenewable("token has not been issued".to_string()))
    }
}

#[async_trait]
impl LeaseProvider for TokenProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Token
    }

    async fn initialize(&self) -> Result<Lease, SecretsError> {
        let response = self.exchange().await?;

        let token = response
            .data
            .get("token")
            .and_then(Value::as_str)
            .map(|token| Secret::new(token.to_string()));
        *self.token.lock() = token;

        let mut lease = Lease::new(response.data.clone(), response.lease_duration);
        if let Some(max_ttl) = response.max_ttl() {
            lease = lease.with_max_ttl(max_ttl);
        }

        info!(
            lease_duration = lease.lease_duration,
            max_ttl = ?lease.max_ttl,
            "Obtained bootstrap token from warden"
        );
        Ok(lease)
    }

    fn can_renew(&self) -> bool {
        true
    }

    async fn renew(&self) -> Result<Lease, SecretsError> {
        let token = self.current_token()?;
        let increment = format!("{}s", self.renew_increment.as_secs());

        let response = self
            .vault
            .write(
                Method::POST,
                &token,
                "auth/token/renew-self",
                &json!({ "increment": increment }),
            )
            .await?;
        let auth = response.auth.ok_or_else(|| {
            SecretsError::Internal("renew-self response has no auth block".to_string())
        })?;

        debug!(lease_duration = auth.lease_duration, "Renewed bootstrap token");
        Ok(Lease::new(Value::Null, auth.lease_duration).with_renewable(auth.renewable))
    }

    fn invalidate(&self) {
        self.token.lock().take();
    }

    fn renew_ceiling(&self) -> Option<Duration> {
        Some(self.renew_increment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warden(creation: Option<&str>, expiration: Option<&str>) -> WardenResponse {
        WardenResponse {
            data: json!({"token": "T"}),
            lease_duration: 300,
            creation_time: creation.map(str::to_string),
            expiration_time: expiration.map(str::to_string),
        }
    }

    #[test]
    fn test_max_ttl_from_timestamps() {
        let response = warden(
            Some("2024-01-01T00:00:00Z"),
            Some("2024-01-01T01:00:00+00:00"),
        );
        assert_eq!(response.max_ttl(), Some(3600));
    }

    #[test]
    fn test_max_ttl_requires_both_timestamps() {
        assert_eq!(warden(Some("2024-01-01T00:00:00Z"), None).max_ttl(), None);
        assert_eq!(warden(Some("yesterday"), Some("today")).max_ttl(), None);
        assert_eq!(
            warden(Some("2024-01-02T00:00:00Z"), Some("2024-01-01T00:00:00Z")).max_ttl(),
            None
        );
    }

    #[test]
    fn test_renew_ceiling_is_increment() {
        let config = VaultConfig {
            token_renew_increment: Duration::from_secs(600),
            ..Default::default()
        };
        let provider = TokenProvider::new(
            VaultClient::new(&config).unwrap(),
            &config,
            BootstrapConfig::default(),
        )
        .unwrap();

        assert_eq!(provider.renew_ceiling(), Some(Duration::from_secs(600)));
    }

    #[tokio::test]
    async fn test_renew_before_initialize_fails() {
        let config = VaultConfig::default();
        let provider = TokenProvider::new(
            VaultClient::new(&config).unwrap(),
            &config,
            BootstrapConfig::default(),
        )
        .unwrap();

        assert!(matches!(
            provider.renew().await,
            Err(SecretsError::NotRenewable(_))
        ));
    }
}

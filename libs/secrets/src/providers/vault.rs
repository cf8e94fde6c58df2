//! Minimal Vault HTTP client shared by the Vault-backed providers
//!
//! See: https://developer.hashicorp.com/vault/api-docs

use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{Lease, SecretsError, VaultConfig};

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Response envelope shared by Vault's secret and auth endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultResponse {
    #[serde(default)]
    pub lease_id: String,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub auth: Option<VaultAuth>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultAuth {
    pub client_token: String,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

impl VaultResponse {
    /// Lease built from a secret read
    pub fn into_lease(self) -> Lease {
        let lease = Lease::new(self.data, self.lease_duration);
        if self.lease_id.is_empty() {
            lease
        } else {
            lease.with_lease_id(self.lease_id)
        }
    }
}

#[derive(Debug, Clone)]
pub struct VaultClient {
    client: Client,
    addr: String,
}

impl VaultClient {
    pub fn new(config: &VaultConfig) -> Result<Self, SecretsError> {
        if config.addr.trim().is_empty() {
            return Err(SecretsError::InvalidConfig(
                "Vault address is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SecretsError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            addr: config.addr.trim_end_matches('/').to_string(),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// `GET /v1/{path}`
    pub async fn read(
        &self,
        token: &Secret<String>,
        path: &str,
    ) -> Result<VaultResponse, SecretsError> {
        self.request(Method::GET, token, path, None).await
    }

    /// `{method} /v1/{path}` with a JSON body
    pub async fn write(
        &self,
        method: Method,
        token: &Secret<String>,
        path: &str,
        body: &Value,
    ) -> Result<VaultResponse, SecretsError> {
        self.request(method, token, path, Some(body)).await
    }

    async fn request(
        &self,
        method: Method,
        token: &Secret<String>,
        path: &str,
        body: Option<&Value>,
    ) -> Result<VaultResponse, SecretsError> {
        let url = format!("{}/v1/{}", self.addr, encode_path(path));
        debug!(%method, path, "Vault request");

        let mut request = self
            .client
            .request(method, &url)
            .header(TOKEN_HEADER, token.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SecretsError::ConnectionFailed(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                if status == StatusCode::NO_CONTENT {
                    return Ok(VaultResponse::default());
                }
                Ok(response.json().await?)
            }
            StatusCode::UNAUTHORIZED => Err(SecretsError::AuthenticationFailed(
                "Token expired or invalid".to_string(),
            )),
            StatusCode::FORBIDDEN => Err(SecretsError::PermissionDenied(path.to_string())),
            StatusCode::NOT_FOUND => Err(SecretsError::NotFound(path.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                Err(SecretsError::RateLimited("Rate limit exceeded".to_string()))
            }
            status => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(SecretsError::Internal(format!("HTTP {status}: {body}")))
            }
        }
    }
}

/// Path relative to a mount, without surrounding slashes.
///
/// Dot segments and empty inner segments are rejected: URL normalization
/// would otherwise resolve them and move the request out of its mount.
pub(crate) fn checked_path(path: &str) -> Result<&str, SecretsError> {
    let path = path.trim_matches('/');
    if path.is_empty() {
        return Err(SecretsError::InvalidConfig("path is required".to_string()));
    }

    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(SecretsError::InvalidConfig(format!(
            "path '{path}' must not contain empty, '.' or '..' segments"
        )));
    }

    Ok(path)
}

/// Percent-encode each path segment, keeping the separators
pub(crate) fn encode_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_path() {
        assert_eq!(encode_path("secret/app/db"), "secret/app/db");
        assert_eq!(encode_path("/cubbyhole/my key"), "cubbyhole/my%20key");
        assert_eq!(encode_path("secret/a?b"), "secret/a%3Fb");
    }

    #[test]
    fn test_checked_path() {
        assert_eq!(checked_path("/app/db/").unwrap(), "app/db");
        assert_eq!(checked_path("app/.env").unwrap(), "app/.env");

        for path in ["", "/", "../auth/token/lookup-self", "app/../../sys", "app//db", "./app"] {
            assert!(
                matches!(checked_path(path), Err(SecretsError::InvalidConfig(_))),
                "accepted {path:?}"
            );
        }
    }

    #[test]
    fn test_response_into_lease() {
        let response: VaultResponse = serde_json::from_value(json!({
            "lease_id": "database/creds/app/abc",
            "lease_duration": 300,
            "renewable": true,
            "data": {"username": "u", "password": "p"}
        }))
        .unwrap();

        let lease = response.into_lease();
        assert_eq!(lease.lease_duration, 300);
        assert_eq!(lease.lease_id.as_deref(), Some("database/creds/app/abc"));
        assert_eq!(lease.data["username"], "u");
    }

    #[test]
    fn test_missing_address_is_rejected() {
        let config = VaultConfig {
            addr: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            VaultClient::new(&config),
            Err(SecretsError::InvalidConfig(_))
        ));
    }
}

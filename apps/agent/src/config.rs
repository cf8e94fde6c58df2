use std::str::FromStr;
use std::time::Duration;

use secrets::{parse_duration, BootstrapConfig, KmsConfig, RegistryConfig, VaultConfig};

use crate::app::RouterLimits;
use crate::constants::{
    AGENT_HOST, AGENT_PORT, KMS_REGION, MAX_BODY_SIZE_BYTES, METADATA_URL, MIN_RENEW_INTERVAL_MS,
    REQUEST_TIMEOUT_SECS, SHUTDOWN_TIMEOUT_SECS, STORAGE_TIMEOUT_MS, TOKEN_RENEW_INCREMENT,
    VAULT_ADDR, WARDEN_URL,
};

/// Parse `name` from the lookup, falling back to `default` when it is unset
/// or malformed.
fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(env_var = name, value = %raw, "ignoring invalid value in configuration");
            default
        }),
        None => default,
    }
}

fn string_or<F>(lookup: &F, name: &str, default: String) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub host: String,
    pub port: u16,
    pub vault: VaultConfig,
    pub bootstrap: BootstrapConfig,
    pub kms: KmsConfig,
    pub registry: RegistryConfig,
    pub max_body_size: usize,
    pub shutdown_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4500,
            vault: VaultConfig::default(),
            bootstrap: BootstrapConfig::default(),
            kms: KmsConfig::default(),
            registry: RegistryConfig::default(),
            max_body_size: 1_048_576, // 1MB
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let token_renew_increment = match lookup(TOKEN_RENEW_INCREMENT) {
            Some(raw) => match parse_duration(&raw) {
                Ok(increment) if !increment.is_zero() => increment,
                Ok(_) | Err(_) => {
                    tracing::warn!(
                        env_var = TOKEN_RENEW_INCREMENT,
                        value = %raw,
                        "ignoring invalid duration in configuration"
                    );
                    default.vault.token_renew_increment
                }
            },
            None => default.vault.token_renew_increment,
        };

        let request_timeout_secs: u64 = parse_or(
            &lookup,
            REQUEST_TIMEOUT_SECS,
            default.vault.request_timeout.as_secs(),
        );
        let storage_timeout_ms: u64 = parse_or(
            &lookup,
            STORAGE_TIMEOUT_MS,
            default.registry.timeout.as_millis() as u64,
        );
        let min_renew_interval_ms: u64 = parse_or(
            &lookup,
            MIN_RENEW_INTERVAL_MS,
            default.registry.min_renew_interval.as_millis() as u64,
        );
        let shutdown_timeout_secs: u64 = parse_or(&lookup, SHUTDOWN_TIMEOUT_SECS, 30);

        Self {
            host: string_or(&lookup, AGENT_HOST, default.host),
            port: parse_or(&lookup, AGENT_PORT, default.port),
            vault: VaultConfig {
                addr: string_or(&lookup, VAULT_ADDR, default.vault.addr),
                token_renew_increment,
                request_timeout: Duration::from_secs(request_timeout_secs),
            },
            bootstrap: BootstrapConfig {
                metadata_url: string_or(&lookup, METADATA_URL, default.bootstrap.metadata_url),
                warden_url: string_or(&lookup, WARDEN_URL, default.bootstrap.warden_url),
            },
            kms: KmsConfig {
                region: string_or(&lookup, KMS_REGION, default.kms.region),
            },
            registry: RegistryConfig {
                timeout: Duration::from_millis(storage_timeout_ms),
                min_renew_interval: Duration::from_millis(min_renew_interval_ms),
                ..default.registry
            },
            max_body_size: parse_or(&lookup, MAX_BODY_SIZE_BYTES, default.max_body_size),
            shutdown_timeout: Duration::from_secs(shutdown_timeout_secs),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Limits applied by the router; the request timeout matches the
    /// upstream HTTP timeout
    pub fn router_limits(&self) -> RouterLimits {
        RouterLimits {
            request_timeout: self.vault.request_timeout,
            max_body_size: self.max_body_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AgentConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);

        assert_eq!(config.bind_addr(), "127.0.0.1:4500");
        assert_eq!(config.vault.addr, "http://127.0.0.1:8200");
        assert_eq!(config.bootstrap.warden_url, "http://127.0.0.1:3000");
        assert_eq!(config.bootstrap.metadata_url, "http://169.254.169.254");
        assert_eq!(config.registry.timeout, Duration::from_millis(500));
        assert_eq!(config.registry.min_renew_interval, Duration::from_millis(100));
        assert_eq!(config.vault.token_renew_increment, Duration::from_secs(3600));
        assert_eq!(config.router_limits().request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_body_size, 1_048_576);
        assert_eq!(config.kms.region, "us-east-1");
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            (AGENT_PORT, "4600"),
            (VAULT_ADDR, "https://vault.internal:8200"),
            (STORAGE_TIMEOUT_MS, "250"),
            (TOKEN_RENEW_INCREMENT, "768h"),
            (MIN_RENEW_INTERVAL_MS, "1000"),
            (KMS_REGION, "eu-west-1"),
        ]);

        assert_eq!(config.port, 4600);
        assert_eq!(config.vault.addr, "https://vault.internal:8200");
        assert_eq!(config.registry.timeout, Duration::from_millis(250));
        assert_eq!(
            config.vault.token_renew_increment,
            Duration::from_secs(768 * 3600)
        );
        assert_eq!(config.registry.min_renew_interval, Duration::from_secs(1));
        assert_eq!(config.kms.region, "eu-west-1");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config(&[
            (AGENT_PORT, "not-a-port"),
            (TOKEN_RENEW_INCREMENT, "20foo"),
            (VAULT_ADDR, "  "),
        ]);

        assert_eq!(config.port, 4500);
        assert_eq!(config.vault.token_renew_increment, Duration::from_secs(3600));
        assert_eq!(config.vault.addr, "http://127.0.0.1:8200");
    }
}

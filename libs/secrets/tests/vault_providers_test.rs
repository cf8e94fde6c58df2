//! Vault provider tests against a mocked Vault, warden and metadata service

use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use secrets::providers::{
    CredentialProvider, GenericProvider, TokenProvider, TransitProvider, VaultClient,
    VaultProviderFactory,
};
use secrets::{
    BootstrapConfig, LeaseProvider, ManagerRegistry, ProviderKind, RegistryConfig,
    SecretDescriptor, SecretsError, VaultConfig,
};

/// Route provider and manager logs to the test output (`RUST_LOG=debug`)
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn vault_config(server: &MockServer) -> VaultConfig {
    VaultConfig {
        addr: server.uri(),
        token_renew_increment: Duration::from_secs(600),
        request_timeout: Duration::from_secs(5),
    }
}

fn bootstrap_config(server: &MockServer) -> BootstrapConfig {
    BootstrapConfig {
        metadata_url: server.uri(),
        warden_url: format!("{}/warden", server.uri()),
    }
}

fn client(server: &MockServer) -> VaultClient {
    VaultClient::new(&vault_config(server)).unwrap()
}

async fn mount_identity(server: &MockServer) {
    for (part, body) in [
        ("document", r#"{"instanceId":"i-0abc"}"#),
        ("signature", "c2lnbmF0dXJl"),
        ("pkcs7", "cGtjczc="),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/latest/dynamic/instance-identity/{part}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }
}

async fn mount_warden(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/warden"))
        .and(body_json(json!({
            "document": {"instanceId": "i-0abc"},
            "signature": "c2lnbmF0dXJl",
            "pkcs7": "cGtjczc=",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"token": "T"},
            "lease_duration": 300,
            "creation_time": "2024-01-01T00:00:00Z",
            "expiration_time": "2024-01-02T00:00:00Z",
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_secret_read_is_cached_until_invalidated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/app/db"))
        .and(header("X-Vault-Token", "T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lease_id": "",
            "lease_duration": 2764800,
            "renewable": false,
            "data": {"password": "hunter2"}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let provider = GenericProvider::secret(client(&server), "app/db", "T").unwrap();

    let lease = provider.initialize().await.unwrap();
    assert_eq!(lease.data, json!({"password": "hunter2"}));
    assert_eq!(lease.lease_duration, 2764800);
    assert_eq!(lease.renewable, None);

    provider.initialize().await.unwrap();
    provider.invalidate();
    provider.initialize().await.unwrap();
}

#[tokio::test]
async fn test_cubbyhole_renew_rereads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/cubbyhole/my-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lease_duration": 0,
            "data": {"value": "v"}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let provider = GenericProvider::cubbyhole(client(&server), "my-key", "T").unwrap();

    let lease = provider.initialize().await.unwrap();
    assert_eq!(lease.renewable, Some(false));
    let renewed = provider.renew().await.unwrap();
    assert_eq!(renewed.data, json!({"value": "v"}));
}

#[tokio::test]
async fn test_http_status_mapping() {
    let server = MockServer::start().await;
    for (status, secret) in [(401u16, "a"), (403, "b"), (404, "c"), (429, "d"), (500, "e")] {
        Mock::given(method("GET"))
            .and(path(format!("/v1/secret/{secret}")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }

    let read = |secret: &'static str| {
        let provider = GenericProvider::secret(client(&server), secret, "T").unwrap();
        async move { provider.initialize().await.unwrap_err() }
    };

    assert!(matches!(read("a").await, SecretsError::AuthenticationFailed(_)));
    assert!(matches!(read("b").await, SecretsError::PermissionDenied(_)));
    assert!(matches!(read("c").await, SecretsError::NotFound(_)));
    assert!(matches!(read("d").await, SecretsError::RateLimited(_)));
    assert!(matches!(read("e").await, SecretsError::Internal(_)));
}

#[tokio::test]
async fn test_unreachable_vault_is_connection_failure() {
    let config = VaultConfig {
        addr: "http://127.0.0.1:1".to_string(),
        ..Default::default()
    };
    let provider =
        GenericProvider::secret(VaultClient::new(&config).unwrap(), "app/db", "T").unwrap();

    assert!(matches!(
        provider.initialize().await,
        Err(SecretsError::ConnectionFailed(_))
    ));
}

#[tokio::test]
async fn test_credential_issue_and_renew() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/database/creds/readonly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lease_id": "database/creds/readonly/abc",
            "lease_duration": 300,
            "renewable": true,
            "data": {"username": "u", "password": "p"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/leases/renew"))
        .and(body_json(json!({"lease_id": "database/creds/readonly/abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lease_id": "database/creds/readonly/abc",
            "lease_duration": 600,
            "renewable": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = CredentialProvider::new(client(&server), "database/readonly", "T").unwrap();

    let lease = provider.initialize().await.unwrap();
    assert_eq!(lease.data["username"], "u");
    assert_eq!(lease.renewable, Some(true));
    assert_eq!(lease.lease_id.as_deref(), Some("database/creds/readonly/abc"));

    let renewed = provider.renew().await.unwrap();
    assert_eq!(renewed.lease_duration, 600);
    assert_eq!(renewed.data, Value::Null);
}

#[tokio::test]
async fn test_transit_decrypt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/transit/decrypt/app"))
        .and(body_json(json!({"ciphertext": "vault:v1:abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"plaintext": "aGVsbG8="}
        })))
        .mount(&server)
        .await;

    let mut fields = Map::new();
    fields.insert("key".to_string(), json!("app"));
    fields.insert("ciphertext".to_string(), json!("vault:v1:abc"));
    let provider =
        TransitProvider::new(client(&server), &SecretDescriptor::from(fields), "T").unwrap();

    let lease = provider.initialize().await.unwrap();
    assert_eq!(lease.data, json!({"plaintext": "aGVsbG8="}));
    assert_eq!(lease.renewable, Some(false));
}

#[tokio::test]
async fn test_token_exchange_and_renew_self() {
    init_tracing();
    let server = MockServer::start().await;
    mount_identity(&server).await;
    mount_warden(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/renew-self"))
        .and(header("X-Vault-Token", "T"))
        .and(body_json(json!({"increment": "600s"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth": {"client_token": "T", "lease_duration": 600, "renewable": true}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = vault_config(&server);
    let provider =
        TokenProvider::new(client(&server), &config, bootstrap_config(&server)).unwrap();

    let lease = provider.initialize().await.unwrap();
    assert_eq!(lease.data, json!({"token": "T"}));
    assert_eq!(lease.lease_duration, 300);
    assert_eq!(lease.max_ttl, Some(86400));

    let renewed = provider.renew().await.unwrap();
    assert_eq!(renewed.lease_duration, 600);
    assert_eq!(renewed.data, Value::Null);
}

#[tokio::test]
async fn test_warden_rejection_is_authentication_failure() {
    let server = MockServer::start().await;
    mount_identity(&server).await;
    Mock::given(method("POST"))
        .and(path("/warden"))
        .respond_with(ResponseTemplate::new(403).set_body_string("unknown instance"))
        .mount(&server)
        .await;

    let config = vault_config(&server);
    let provider =
        TokenProvider::new(client(&server), &config, bootstrap_config(&server)).unwrap();

    let err = provider.initialize().await.unwrap_err();
    assert!(matches!(err, SecretsError::AuthenticationFailed(msg) if msg.contains("unknown instance")));
}

#[tokio::test]
async fn test_registry_end_to_end_with_vault() {
    init_tracing();
    let server = MockServer::start().await;
    mount_identity(&server).await;
    mount_warden(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/app/db"))
        .and(header("X-Vault-Token", "T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lease_duration": 3600,
            "data": {"password": "hunter2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let factory =
        VaultProviderFactory::new(vault_config(&server), bootstrap_config(&server)).unwrap();
    let registry = ManagerRegistry::new(
        Arc::new(factory),
        RegistryConfig::default().with_timeout(Duration::from_secs(5)),
    );

    let first = registry
        .lookup("default", &"app/db".into(), ProviderKind::Secret)
        .await
        .unwrap();
    let second = registry
        .lookup("default", &"app/db".into(), ProviderKind::Secret)
        .await
        .unwrap();

    assert_eq!(first.data, json!({"password": "hunter2"}));
    assert_eq!(first.correlation_id, second.correlation_id);

    let token = registry
        .lookup("default", &"default".into(), ProviderKind::Token)
        .await
        .unwrap();
    assert_eq!(token.data["token"], "T");
}

#[tokio::test]
async fn test_dot_segments_cannot_leave_the_mount() {
    init_tracing();
    let server = MockServer::start().await;
    mount_identity(&server).await;
    mount_warden(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "BOOTSTRAP-TOKEN-INFO"}
        })))
        .expect(0)
        .mount(&server)
        .await;

    for path in ["../auth/token/lookup-self", "app/../../auth/token/lookup-self"] {
        assert!(matches!(
            GenericProvider::secret(client(&server), path, "T"),
            Err(SecretsError::InvalidConfig(_))
        ));
        assert!(matches!(
            GenericProvider::cubbyhole(client(&server), path, "T"),
            Err(SecretsError::InvalidConfig(_))
        ));
    }
    assert!(matches!(
        CredentialProvider::new(client(&server), "../auth", "T"),
        Err(SecretsError::InvalidConfig(_))
    ));

    let factory =
        VaultProviderFactory::new(vault_config(&server), bootstrap_config(&server)).unwrap();
    let registry = ManagerRegistry::new(
        Arc::new(factory),
        RegistryConfig::default().with_timeout(Duration::from_secs(5)),
    );

    let err = registry
        .lookup(
            "default",
            &"../auth/token/lookup-self".into(),
            ProviderKind::Secret,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SecretsError::InvalidConfig(_)));
    assert_eq!(registry.len(), 1);
}

use std::sync::Arc;

use secrets::providers::{AwsKmsClient, VaultProviderFactory};
use secrets::ManagerRegistry;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use secrets_agent::app::build_router;
use secrets_agent::config::AgentConfig;
use secrets_agent::constants::{ENV, LOCAL_ENV, SERVICE};
use secrets_agent::shutdown::shutdown_signal;
use secrets_agent::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Setup tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let env = std::env::var(ENV)
        .map_err(|_| format!("{} environment variable must be set", ENV))?;

    let registry = tracing_subscriber::registry().with(filter);

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true);

    if env == LOCAL_ENV {
        let pretty_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .pretty();
        registry.with(json_layer).with(pretty_layer).init();
    } else {
        registry.with(json_layer).init();
    }

    tracing::info!(service = SERVICE, env = %env, "tracing initialized");

    let config = AgentConfig::from_env();
    tracing::info!(
        vault_addr = %config.vault.addr,
        warden_url = %config.bootstrap.warden_url,
        metadata_url = %config.bootstrap.metadata_url,
        kms_region = %config.kms.region,
        storage_timeout_ms = config.registry.timeout.as_millis() as u64,
        token_renew_increment_secs = config.vault.token_renew_increment.as_secs(),
        max_body_size = config.max_body_size,
        "agent configuration loaded"
    );

    let factory = VaultProviderFactory::new(config.vault.clone(), config.bootstrap.clone())?
        .with_kms(Arc::new(AwsKmsClient::new()), config.kms.clone());
    let managers = Arc::new(ManagerRegistry::new(
        Arc::new(factory),
        config.registry.clone(),
    ));

    // obtain the bootstrap token before the first request arrives
    managers.default_token()?.start_initialize();

    let app_state = AppState::new(managers, env.clone());
    let app = build_router(app_state, &config.router_limits());

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!("{} is ready to accept requests at: http://{}/v1", SERVICE, addr);

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.shutdown_timeout))
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    Ok(())
}

pub const SERVICE: &str = "secrets-agent";
pub const ENV: &str = "ENV";

pub const LOCAL_ENV: &str = "local";

// Listener
pub const AGENT_HOST: &str = "AGENT_HOST";
pub const AGENT_PORT: &str = "AGENT_PORT";

// Upstream services
pub const VAULT_ADDR: &str = "VAULT_ADDR";
pub const WARDEN_URL: &str = "WARDEN_URL";
pub const METADATA_URL: &str = "METADATA_URL";
pub const KMS_REGION: &str = "KMS_REGION";

// Lease management
pub const STORAGE_TIMEOUT_MS: &str = "STORAGE_TIMEOUT_MS";
pub const TOKEN_RENEW_INCREMENT: &str = "TOKEN_RENEW_INCREMENT";
pub const MIN_RENEW_INTERVAL_MS: &str = "MIN_RENEW_INTERVAL_MS";

// Middleware configuration
pub const REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
pub const MAX_BODY_SIZE_BYTES: &str = "MAX_BODY_SIZE_BYTES";
pub const SHUTDOWN_TIMEOUT_SECS: &str = "SHUTDOWN_TIMEOUT_SECS";

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

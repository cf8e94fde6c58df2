// API v1 routes (nested under /v1)
pub const HEALTH_PATH: &str = "/health";
pub const TOKEN_PATH: &str = "/token/default";
pub const SECRET_PATH: &str = "/secret/{token}/{*path}";
pub const CUBBYHOLE_PATH: &str = "/cubbyhole/{token}/{*path}";
pub const CREDENTIAL_PATH: &str = "/credential/{token}/{mount}/{role}";
pub const TRANSIT_DECRYPT_PATH: &str = "/transit/{token}/decrypt";
pub const KMS_DECRYPT_PATH: &str = "/kms/decrypt";

// Root-level service routes (not versioned)
pub const OPENAPI_PATH: &str = "/api-doc/openapi.json";

// API version prefix
pub const API_V1_PREFIX: &str = "/v1";

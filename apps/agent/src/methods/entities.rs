use axum::{
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::constants::CORRELATION_ID_HEADER;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Milliseconds since the agent started
    pub uptime: u64,
    pub version: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct TransitDecryptRequest {
    /// Name of the transit key
    pub key: String,
    /// Vault ciphertext (`vault:v1:...`)
    pub ciphertext: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct KmsDecryptRequest {
    /// Base64 KMS ciphertext blob
    pub ciphertext: String,
    /// AWS region of the key; the agent's configured region when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Secret data returned to the caller; the manager's correlation id travels
/// in a header instead of the body.
#[derive(Debug)]
pub struct SecretResponse {
    pub data: Value,
    pub correlation_id: Uuid,
}

impl IntoResponse for SecretResponse {
    fn into_response(self) -> Response {
        let mut data = self.data;
        if let Some(fields) = data.as_object_mut() {
            fields.remove("correlation_id");
        }

        let mut response = Json(data).into_response();
        if let Ok(value) = HeaderValue::from_str(&self.correlation_id.to_string()) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
        }
        response
    }
}

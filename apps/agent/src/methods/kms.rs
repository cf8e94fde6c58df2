use axum::{body::Bytes, extract::State, http::HeaderMap};
use secrets::{ProviderKind, SecretDescriptor};
use serde_json::{Map, Value};

use super::{decode_plaintext, is_json, lowercase_keys};
use crate::error::ApiError;
use crate::methods::entities::{KmsDecryptRequest, SecretResponse};
use crate::methods::routes::KMS_DECRYPT_PATH;
use crate::state::AppState;

// KMS secrets are not scoped to a caller token
const KMS_TOKEN: &str = "default";

#[utoipa::path(
    post,
    path = KMS_DECRYPT_PATH,
    operation_id = "kms_decrypt",
    tag = "secrets",
    request_body = KmsDecryptRequest,
    responses(
        (status = 200, description = "Decrypted plaintext and key id",
            headers(("x-correlation-id" = String, description = "Id of the serving lease manager"))),
        (status = 400, description = "Invalid Content-Type or body", body = crate::error::ErrorResponse),
        (status = 502, description = "KMS rejected the ciphertext", body = crate::error::ErrorResponse),
        (status = 503, description = "Bootstrap token unavailable", body = crate::error::ErrorResponse),
        (status = 504, description = "Decryption not ready in time", body = crate::error::ErrorResponse),
    )
)]
pub async fn decrypt(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<SecretResponse, ApiError> {
    if !is_json(&headers) {
        return Err(ApiError::invalid_content_type());
    }

    let request: KmsDecryptRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("invalid request body: {e}")))?;

    let mut fields = Map::new();
    fields.insert("ciphertext".to_string(), Value::String(request.ciphertext));
    if let Some(region) = request.region {
        fields.insert("region".to_string(), Value::String(region));
    }

    let mut response = super::lookup(
        &state,
        KMS_TOKEN,
        SecretDescriptor::from(fields),
        ProviderKind::Kms,
    )
    .await?;
    response.data = lowercase_keys(response.data);
    decode_plaintext(&mut response.data);

    Ok(response)
}

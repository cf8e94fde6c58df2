use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use secrets::{ProviderKind, SecretDescriptor};
use serde_json::{Map, Value};

use super::{decode_plaintext, is_json};
use crate::error::ApiError;
use crate::methods::entities::{SecretResponse, TransitDecryptRequest};
use crate::methods::routes::TRANSIT_DECRYPT_PATH;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = TRANSIT_DECRYPT_PATH,
    tag = "secrets",
    params(
        ("token" = String, Path, description = "Caller token namespace"),
    ),
    request_body = TransitDecryptRequest,
    responses(
        (status = 200, description = "Decrypted plaintext",
            headers(("x-correlation-id" = String, description = "Id of the serving lease manager"))),
        (status = 400, description = "Invalid Content-Type or body", body = crate::error::ErrorResponse),
        (status = 503, description = "Bootstrap token unavailable", body = crate::error::ErrorResponse),
        (status = 504, description = "Decryption not ready in time", body = crate::error::ErrorResponse),
    )
)]
pub async fn decrypt(
    Path(token): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<SecretResponse, ApiError> {
    if !is_json(&headers) {
        return Err(ApiError::invalid_content_type());
    }

    let request: TransitDecryptRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("invalid request body: {e}")))?;

    let mut fields = Map::new();
    fields.insert("key".to_string(), Value::String(request.key));
    fields.insert("ciphertext".to_string(), Value::String(request.ciphertext));

    let mut response = super::lookup(
        &state,
        &token,
        SecretDescriptor::from(fields),
        ProviderKind::Transit,
    )
    .await?;
    decode_plaintext(&mut response.data);

    Ok(response)
}

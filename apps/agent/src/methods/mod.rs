pub mod credential;
pub mod cubbyhole;
pub mod entities;
pub mod health_check;
pub mod kms;
pub mod routes;
pub mod secret;
pub mod token;
pub mod transit;

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrets::{ProviderKind, SecretDescriptor};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::methods::entities::SecretResponse;
use crate::state::AppState;

/// Shared body of the lookup handlers
pub(crate) async fn lookup(
    state: &AppState,
    token: &str,
    descriptor: SecretDescriptor,
    kind: ProviderKind,
) -> Result<SecretResponse, ApiError> {
    let result = state.lookup.lookup(token, &descriptor, kind).await?;

    tracing::info!(
        provider = %kind,
        correlation_id = %result.correlation_id,
        "secret lookup served"
    );

    Ok(SecretResponse {
        data: result.data,
        correlation_id: result.correlation_id,
    })
}

/// Whether the request declares a JSON body (any charset)
pub(crate) fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Replace a base64 `plaintext` field with its decoded text
pub(crate) fn decode_plaintext(data: &mut Value) {
    let Some(encoded) = data.get("plaintext").and_then(Value::as_str) else {
        return;
    };

    match STANDARD.decode(encoded) {
        Ok(bytes) => {
            let decoded = String::from_utf8_lossy(&bytes).into_owned();
            data["plaintext"] = Value::String(decoded);
        }
        Err(e) => tracing::warn!(error = %e, "plaintext is not valid base64"),
    }
}

/// Lowercase the top-level keys of an object
pub(crate) fn lowercase_keys(data: Value) -> Value {
    match data {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key.to_lowercase(), value))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_content_type_check() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(!is_json(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(is_json(&headers));
    }

    #[test]
    fn test_decode_plaintext() {
        let mut data = json!({"plaintext": "aGVsbG8gd29ybGQ="});
        decode_plaintext(&mut data);
        assert_eq!(data["plaintext"], "hello world");

        let mut untouched = json!({"other": "aGVsbG8="});
        decode_plaintext(&mut untouched);
        assert_eq!(untouched, json!({"other": "aGVsbG8="}));
    }

    #[test]
    fn test_lowercase_keys() {
        assert_eq!(
            lowercase_keys(json!({"KeyId": "k", "Plaintext": "cA=="})),
            json!({"keyid": "k", "plaintext": "cA=="})
        );
        assert_eq!(lowercase_keys(Value::Null), Value::Null);
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use secrets::{ErrorClass, SecretsError};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub name: String,
    pub message: String,
}

/// `{ "error": { "name", "message" } }`
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug)]
pub enum ApiError {
    /// Malformed request (headers, body)
    Validation(String),
    /// Failure surfaced by the lookup layer
    Lookup(SecretsError),
}

impl ApiError {
    pub fn invalid_content_type() -> Self {
        ApiError::Validation("Content-Type must be `application/json; charset=utf-8`.".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Lookup(err) => match err.class() {
                ErrorClass::Configuration => StatusCode::BAD_REQUEST,
                ErrorClass::Bootstrap => StatusCode::SERVICE_UNAVAILABLE,
                ErrorClass::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ErrorClass::Fetch => StatusCode::BAD_GATEWAY,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::Lookup(err) => err.name(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let name = self.name().to_string();
        let message = match self {
            ApiError::Validation(msg) => msg,
            ApiError::Lookup(err) => err.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), name = %name, message = %message, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), name = %name, message = %message, "request rejected");
        }

        (status, Json(ErrorResponse { error: ErrorBody { name, message } })).into_response()
    }
}

impl From<SecretsError> for ApiError {
    fn from(err: SecretsError) -> Self {
        ApiError::Lookup(err)
    }
}

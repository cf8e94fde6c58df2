use std::time::Duration;

use axum::{
    http::{HeaderName, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use utoipa::OpenApi;

use crate::constants::REQUEST_ID_HEADER;
use crate::error::{ErrorBody, ErrorResponse};
use crate::methods::credential::{__path_get_credential, get_credential};
use crate::methods::cubbyhole::{__path_get_cubbyhole, get_cubbyhole};
use crate::methods::entities::{HealthResponse, KmsDecryptRequest, TransitDecryptRequest};
use crate::methods::health_check::{__path_health_check, health_check};
use crate::methods::kms;
use crate::methods::routes::{
    API_V1_PREFIX, CREDENTIAL_PATH, CUBBYHOLE_PATH, HEALTH_PATH, KMS_DECRYPT_PATH, OPENAPI_PATH,
    SECRET_PATH, TOKEN_PATH, TRANSIT_DECRYPT_PATH,
};
use crate::methods::secret::{__path_get_secret, get_secret};
use crate::methods::token::{__path_default_token, default_token};
use crate::methods::transit::{__path_decrypt, decrypt};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        default_token,
        get_secret,
        get_cubbyhole,
        get_credential,
        decrypt,
        kms::decrypt
    ),
    components(schemas(
        HealthResponse,
        TransitDecryptRequest,
        KmsDecryptRequest,
        ErrorResponse,
        ErrorBody
    )),
    tags(
        (name = "health", description = "Agent health"),
        (name = "secrets", description = "Secret lookup endpoints")
    )
)]
pub struct ApiDoc;

/// Router limits applied around the handlers
#[derive(Debug, Clone)]
pub struct RouterLimits {
    pub request_timeout: Duration,
    pub max_body_size: usize,
}

impl Default for RouterLimits {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 1_048_576,
        }
    }
}

pub fn build_router(state: AppState, limits: &RouterLimits) -> Router {
    let v1_routes = Router::new()
        .route(HEALTH_PATH, get(health_check))
        .route(TOKEN_PATH, get(default_token))
        .route(SECRET_PATH, get(get_secret))
        .route(CUBBYHOLE_PATH, get(get_cubbyhole))
        .route(CREDENTIAL_PATH, get(get_credential))
        .route(TRANSIT_DECRYPT_PATH, post(decrypt))
        .route(KMS_DECRYPT_PATH, post(kms::decrypt));

    let mut app = Router::new()
        .nest(API_V1_PREFIX, v1_routes)
        .route(OPENAPI_PATH, get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state);

    // Middleware stack (applied inner to outer):
    // Trace → Request ID → Body Limit → Timeout

    app = app.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
            .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
    );

    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    app = app
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    app = app.layer(RequestBodyLimitLayer::new(limits.max_body_size));

    app.layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        limits.request_timeout,
    ))
}

use axum::{extract::State, http::StatusCode, Json};
use secrets::TokenHealth;

use crate::methods::entities::HealthResponse;
use crate::methods::routes::HEALTH_PATH;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = HEALTH_PATH,
    tag = "health",
    responses(
        (status = 200, description = "Bootstrap token is ready", body = HealthResponse),
        (status = 503, description = "Bootstrap token is not ready", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, message) = match state.lookup.token_health().await {
        TokenHealth::Ready => (StatusCode::OK, "OK", None),
        TokenHealth::NotReady => (
            StatusCode::SERVICE_UNAVAILABLE,
            "UNAVAILABLE",
            Some("Manager is not ready.".to_string()),
        ),
        TokenHealth::NoTokenData => (
            StatusCode::SERVICE_UNAVAILABLE,
            "UNAVAILABLE",
            Some("No token data.".to_string()),
        ),
        TokenHealth::Failed(reason) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", Some(reason)),
    };

    let body = HealthResponse {
        status: status.to_string(),
        uptime: state.started.elapsed().as_millis() as u64,
        version: env!("CARGO_PKG_VERSION").to_string(),
        code: code.as_u16(),
        message,
    };

    (code, Json(body))
}

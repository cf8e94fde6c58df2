use axum::extract::State;
use secrets::ProviderKind;

use crate::error::ApiError;
use crate::methods::entities::SecretResponse;
use crate::methods::routes::TOKEN_PATH;
use crate::state::AppState;

const DEFAULT: &str = "default";

#[utoipa::path(
    get,
    path = TOKEN_PATH,
    tag = "secrets",
    responses(
        (status = 200, description = "Bootstrap token data",
            headers(("x-correlation-id" = String, description = "Id of the serving lease manager"))),
        (status = 503, description = "Bootstrap token unavailable", body = crate::error::ErrorResponse),
    )
)]
pub async fn default_token(State(state): State<AppState>) -> Result<SecretResponse, ApiError> {
    super::lookup(&state, DEFAULT, DEFAULT.into(), ProviderKind::Token).await
}

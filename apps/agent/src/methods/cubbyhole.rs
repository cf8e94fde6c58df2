use axum::extract::{Path, State};
use secrets::ProviderKind;

use crate::error::ApiError;
use crate::methods::entities::SecretResponse;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/cubbyhole/{token}/{path}",
    tag = "secrets",
    params(
        ("token" = String, Path, description = "Caller token namespace"),
        ("path" = String, Path, description = "Key under the `cubbyhole/` mount"),
    ),
    responses(
        (status = 200, description = "Cubbyhole data",
            headers(("x-correlation-id" = String, description = "Id of the serving lease manager"))),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 503, description = "Bootstrap token unavailable", body = crate::error::ErrorResponse),
        (status = 504, description = "Secret not ready in time", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_cubbyhole(
    Path((token, path)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<SecretResponse, ApiError> {
    super::lookup(&state, &token, path.as_str().into(), ProviderKind::Cubbyhole).await
}

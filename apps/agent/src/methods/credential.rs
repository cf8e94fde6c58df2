use axum::extract::{Path, State};
use secrets::ProviderKind;

use crate::error::ApiError;
use crate::methods::entities::SecretResponse;
use crate::methods::routes::CREDENTIAL_PATH;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = CREDENTIAL_PATH,
    tag = "secrets",
    params(
        ("token" = String, Path, description = "Caller token namespace"),
        ("mount" = String, Path, description = "Secrets engine mount (e.g. `database`)"),
        ("role" = String, Path, description = "Role to issue credentials for"),
    ),
    responses(
        (status = 200, description = "Issued credentials",
            headers(("x-correlation-id" = String, description = "Id of the serving lease manager"))),
        (status = 503, description = "Bootstrap token unavailable", body = crate::error::ErrorResponse),
        (status = 504, description = "Credentials not ready in time", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_credential(
    Path((token, mount, role)): Path<(String, String, String)>,
    State(state): State<AppState>,
) -> Result<SecretResponse, ApiError> {
    let descriptor = format!("{mount}/{role}");
    super::lookup(&state, &token, descriptor.as_str().into(), ProviderKind::Credential).await
}

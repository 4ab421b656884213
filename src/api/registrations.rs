use axum::{Json, extract::State};
use std::sync::Arc;
use tracing::info;

use super::users::UserRequest;
use super::{ApiError, ApiResponse, AppState, CreatedDto};
use crate::clients::fpl::FplApi;
use crate::domain::UserStatus;

/// POST /registrations
///
/// New participants wait in `PENDING` until an admin approves them.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UserRequest>,
) -> Result<Json<ApiResponse<CreatedDto>>, ApiError> {
    let new_user = payload.validate()?;

    if state.config().registration.verify_entry && !state.fpl().entry_exists(new_user.entry_id).await
    {
        return Err(ApiError::validation(format!(
            "FPL entry {} could not be found",
            new_user.entry_id
        )));
    }

    let user = state
        .store()
        .create_user(new_user, UserStatus::Pending)
        .await?;

    info!(user_id = user.id, entry_id = %user.entry_id, "Registration received");
    Ok(Json(ApiResponse::success(CreatedDto { id: user.id })))
}

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::validation::{
    parse_entry_id, parse_status_change, parse_status_filter, validate_company, validate_email,
    validate_name,
};
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::db::{NewUser, User};
use crate::domain::UserStatus;

/// Body shared by admin creation and public registration.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default, alias = "entryId")]
    pub entry_id: Option<Value>,
}

impl UserRequest {
    pub fn validate(&self) -> Result<NewUser, ApiError> {
        Ok(NewUser {
            name: validate_name(&self.name)?,
            email: validate_email(&self.email)?,
            company: validate_company(self.company.as_deref()),
            entry_id: parse_entry_id(self.entry_id.as_ref())?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let status = parse_status_filter(query.status.as_deref())?;
    let users = state.store().list_users(status).await?;
    Ok(Json(ApiResponse::success(users)))
}

/// Admin-created users skip the approval queue.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UserRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let new_user = payload.validate()?;
    let user = state
        .store()
        .create_user(new_user, UserStatus::Approved)
        .await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn update_user_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let status = parse_status_change(&payload.status)?;

    let user = state
        .store()
        .update_user_status(id, status)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    Ok(Json(ApiResponse::success(user)))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if !state.store().delete_user(id).await? {
        return Err(ApiError::not_found("User", id));
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("User {id} deleted"),
    })))
}

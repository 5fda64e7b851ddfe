//! UserService handlers: self-service profile management and admin listing.
//!
//! Supplemented beyond spec.md's explicit module list (see SPEC_FULL.md §10),
//! grounded in the teacher's handler shapes for authenticated, per-principal
//! resources.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{AuthPrincipal, UserResponse};
use crate::repositories::user as user_repo;
use crate::state::AppState;
use crate::types::UserUuid;

// `get_user` and `list_users` are admin-only; enforcement lives in the
// `require_admin` route layer (see main.rs), not in these handler bodies.

pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_repo::find_by_id(&state.pool, principal.user_id)
        .await?
        .ok_or_else(|| crate::error::user_not_found("user not found"))?;
    Ok(Json(user.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: String,
}

pub async fn update_current_user(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    crate::validation::validate_display_name(&payload.display_name)?;
    user_repo::update_display_name(&state.pool, principal.user_id, &payload.display_name).await?;
    let user = user_repo::find_by_id(&state.pool, principal.user_id)
        .await?
        .ok_or_else(|| crate::error::user_not_found("user not found"))?;
    Ok(Json(user.into()))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .orchestrator
        .change_password(principal.user_id, &payload.current_password, &payload.new_password)
        .await?;
    Ok(Json(serde_json::json!({ "message": "password changed" })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub code: String,
}

/// Scoped to the authenticated principal's own mobile — the SMS code alone
/// isn't enough to pick a target account, or any caller holding a valid
/// `delete_user`-scene code for an arbitrary mobile could disable that
/// account instead of their own.
pub async fn delete_current_user(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(payload): Json<DeleteAccountRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.orchestrator.delete_account(&principal.mobile, &payload.code).await?;
    Ok(Json(serde_json::json!({ "message": "account deleted" })))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let uuid: UserUuid = uuid
        .parse()
        .map_err(|_| AppError::new(crate::error::ErrorCode::InvalidArgument, "malformed uuid"))?;
    let user = user_repo::find_by_uuid(&state.pool, &uuid)
        .await?
        .ok_or_else(|| crate::error::user_not_found("user not found"))?;
    Ok(Json(user.into()))
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserResponse>,
}

pub async fn list_users(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<ListUsersQuery>,
) -> Result<Json<ListUsersResponse>, AppError> {
    if !(1..=200).contains(&query.limit) {
        return Err(AppError::new(crate::error::ErrorCode::InvalidPageSize, "limit must be 1-200"));
    }
    let users = user_repo::list(&state.pool, query.limit, query.offset).await?;
    Ok(Json(ListUsersResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetUserDisabledRequest {
    pub disabled: bool,
}

pub async fn set_user_disabled(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Json(payload): Json<SetUserDisabledRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let uuid: UserUuid = uuid
        .parse()
        .map_err(|_| AppError::new(crate::error::ErrorCode::InvalidArgument, "malformed uuid"))?;
    let user = state.orchestrator.set_user_disabled(&uuid, payload.disabled).await?;
    Ok(Json(user))
}

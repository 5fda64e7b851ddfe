//! AuthService handlers: SMS codes, registration, login, refresh, logout.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{SmsScene, TokenPair, UserResponse};
use crate::state::AppState;

fn parse_scene(scene: &str) -> Result<SmsScene, AppError> {
    match scene {
        "register" => Ok(SmsScene::Register),
        "login" => Ok(SmsScene::Login),
        "reset_password" => Ok(SmsScene::ResetPassword),
        "delete_user" => Ok(SmsScene::DeleteUser),
        _ => Err(AppError::new(
            crate::error::ErrorCode::InvalidArgument,
            "unknown sms scene",
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    pub scene: String,
    pub mobile: String,
}

#[derive(Debug, Serialize)]
pub struct SendCodeResponse {
    pub resend_after_seconds: i64,
}

pub async fn send_verify_code(
    State(state): State<AppState>,
    Json(payload): Json<SendCodeRequest>,
) -> Result<Json<SendCodeResponse>, AppError> {
    let scene = parse_scene(&payload.scene)?;
    let resend_after_seconds = state
        .orchestrator
        .send_verification_code(scene, &payload.mobile)
        .await?;
    Ok(Json(SendCodeResponse { resend_after_seconds }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub mobile: String,
    pub code: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let result = state
        .orchestrator
        .register(&payload.mobile, &payload.code, &payload.password, &payload.display_name)
        .await?;
    Ok(Json(AuthResponse {
        user: result.user,
        tokens: result.tokens,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginByPasswordRequest {
    pub mobile: String,
    pub password: String,
}

pub async fn login_by_password(
    State(state): State<AppState>,
    Json(payload): Json<LoginByPasswordRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let result = state
        .orchestrator
        .login_by_password(&payload.mobile, &payload.password)
        .await?;
    Ok(Json(AuthResponse {
        user: result.user,
        tokens: result.tokens,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginByCodeRequest {
    pub mobile: String,
    pub code: String,
}

pub async fn login_by_code(
    State(state): State<AppState>,
    Json(payload): Json<LoginByCodeRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let result = state.orchestrator.login_by_code(&payload.mobile, &payload.code).await?;
    Ok(Json(AuthResponse {
        user: result.user,
        tokens: result.tokens,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let tokens = state.orchestrator.refresh_token(&payload.refresh_token).await?;
    Ok(Json(tokens))
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: String,
}

pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.orchestrator.logout(&payload.refresh_token).await?;
    Ok(Json(serde_json::json!({ "message": "logged out" })))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub mobile: String,
    pub code: String,
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .orchestrator
        .reset_password(&payload.mobile, &payload.code, &payload.new_password)
        .await?;
    Ok(Json(serde_json::json!({ "message": "password reset" })))
}

#[derive(Debug, Deserialize)]
pub struct ValidateTokenRequest {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateTokenResponse {
    pub user_id: i64,
    pub user_uuid: String,
    pub mobile: String,
    pub role: String,
}

/// Sidecar RPC: peer services exchange a bearer token for the principal it
/// encodes without needing their own copy of the signing secret's trust
/// chain beyond this call.
pub async fn validate_token(
    State(state): State<AppState>,
    Json(payload): Json<ValidateTokenRequest>,
) -> Result<Json<ValidateTokenResponse>, AppError> {
    let payload = state.orchestrator.validate_access_token(&payload.access_token)?;
    Ok(Json(ValidateTokenResponse {
        user_id: payload.user_id,
        user_uuid: payload.user_uuid,
        mobile: payload.mobile,
        role: payload.role,
    }))
}

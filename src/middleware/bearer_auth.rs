//! Request-auth front: parses `authorization: Bearer <token>`, verifies it
//! through the token codec, and attaches an [`AuthPrincipal`] to request
//! extensions for downstream handlers to pull out via `Extension`.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::models::{AuthPrincipal, UserRole};
use crate::state::AppState;

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = match header {
        Some(h) if h.starts_with("Bearer ") => h.trim_start_matches("Bearer ").trim(),
        _ => return Err(crate::error::unauthenticated("missing or malformed bearer header")),
    };

    let payload = state.orchestrator.validate_access_token(token)?;
    let role = match payload.role.as_str() {
        "admin" => UserRole::Admin,
        "super_admin" => UserRole::SuperAdmin,
        _ => UserRole::User,
    };

    request.extensions_mut().insert(AuthPrincipal {
        user_id: payload.user_id,
        user_uuid: payload.user_uuid,
        mobile: payload.mobile,
        role,
    });

    Ok(next.run(request).await)
}

/// Layered after [`require_auth`]; rejects non-admin principals.
pub async fn require_admin(mut request: Request, next: Next) -> Result<Response, AppError> {
    let principal = request
        .extensions()
        .get::<AuthPrincipal>()
        .ok_or_else(|| crate::error::unauthenticated("missing principal"))?
        .clone();

    if !matches!(principal.role, UserRole::Admin | UserRole::SuperAdmin) {
        return Err(crate::error::admin_required("admin role required"));
    }

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

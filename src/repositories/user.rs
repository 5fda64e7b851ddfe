//! User account storage (`users` table).

use chrono::Utc;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{User, UserRole};
use crate::types::UserUuid;

pub async fn find_by_mobile(pool: &PgPool, mobile: &str) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(
        "SELECT id, uuid, mobile, password_hash, display_name, role, disabled, created_at, updated_at \
         FROM users WHERE mobile = $1",
    )
    .bind(mobile)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(
        "SELECT id, uuid, mobile, password_hash, display_name, role, disabled, created_at, updated_at \
         FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)
}

pub async fn find_by_uuid(pool: &PgPool, uuid: &UserUuid) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(
        "SELECT id, uuid, mobile, password_hash, display_name, role, disabled, created_at, updated_at \
         FROM users WHERE uuid = $1",
    )
    .bind(uuid.to_string())
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)
}

/// Inserts a new user row. A unique-violation on `mobile` is surfaced to
/// the caller as-is (the orchestrator maps it to `MobileTaken`).
pub async fn insert(
    pool: &PgPool,
    mobile: &str,
    password_hash: &str,
    display_name: &str,
) -> Result<User, sqlx::Error> {
    let now = Utc::now();
    let uuid = UserUuid::new();
    sqlx::query_as::<_, User>(
        "INSERT INTO users (uuid, mobile, password_hash, display_name, role, disabled, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, false, $6, $6) \
         RETURNING id, uuid, mobile, password_hash, display_name, role, disabled, created_at, updated_at",
    )
    .bind(uuid.to_string())
    .bind(mobile)
    .bind(password_hash)
    .bind(display_name)
    .bind(UserRole::User)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub async fn update_password(pool: &PgPool, user_id: i64, password_hash: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
        .bind(password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_disabled(pool: &PgPool, user_id: i64, disabled: bool) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET disabled = $1, updated_at = $2 WHERE id = $3")
        .bind(disabled)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_display_name(pool: &PgPool, user_id: i64, display_name: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET display_name = $1, updated_at = $2 WHERE id = $3")
        .bind(display_name)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
    sqlx::query_as::<_, User>(
        "SELECT id, uuid, mobile, password_hash, display_name, role, disabled, created_at, updated_at \
         FROM users ORDER BY id ASC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)
}

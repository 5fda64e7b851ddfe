//! Refresh-session storage (§4.C Token store). All time comparisons use the
//! database server clock (`now()`) to avoid skew between app and DB nodes.

use chrono::Utc;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::RefreshSession;

pub async fn save_refresh(pool: &PgPool, user_id: i64, fingerprint: &str, ttl_seconds: i64) -> Result<(), AppError> {
    let expires_at = Utc::now() + chrono::Duration::seconds(ttl_seconds);
    sqlx::query(
        "INSERT INTO user_sessions (user_id, token_hash, expires_at, created_at) VALUES ($1, $2, $3, now())",
    )
    .bind(user_id)
    .bind(fingerprint)
    .bind(expires_at)
    .execute(pool)
    .await
    .map_err(|err| match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::new(crate::error::ErrorCode::Internal, "fingerprint collision")
        }
        other => AppError::from(other),
    })?;
    Ok(())
}

pub async fn find_by_fingerprint(pool: &PgPool, fingerprint: &str) -> Result<Option<RefreshSession>, AppError> {
    sqlx::query_as::<_, RefreshSession>(
        "SELECT id, user_id, token_hash, expires_at, created_at FROM user_sessions WHERE token_hash = $1",
    )
    .bind(fingerprint)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)
}

pub async fn is_valid(pool: &PgPool, fingerprint: &str) -> Result<bool, AppError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM user_sessions WHERE token_hash = $1 AND expires_at > now()",
    )
    .bind(fingerprint)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

pub async fn count_active(pool: &PgPool, user_id: i64) -> Result<i64, AppError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM user_sessions WHERE user_id = $1 AND expires_at > now()",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Idempotent: deleting a fingerprint that doesn't exist is a successful no-op.
pub async fn delete_by_fingerprint(pool: &PgPool, fingerprint: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM user_sessions WHERE token_hash = $1")
        .bind(fingerprint)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_by_user(pool: &PgPool, user_id: i64) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn sweep_expired(pool: &PgPool) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

use std::sync::Arc;

use async_trait::async_trait;
use authd::auth::login_limiter::LoginLimiter;
use authd::auth::orchestrator::AuthOrchestrator;
use authd::error::ErrorCode;
use authd::sms::controller::{SmsController, SmsSender};
use authd::token::codec::TokenCodec;

#[path = "support/mod.rs"]
mod support;

struct NoopSender;

#[async_trait]
impl SmsSender for NoopSender {
    async fn send(&self, _mobile: &str, _code: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

async fn build_orchestrator() -> AuthOrchestrator {
    let config = support::test_config();
    let pool = support::test_pool(&config).await;
    support::truncate_all(&pool).await;
    let cache = support::test_cache(&config).await;

    let codec = TokenCodec::new(
        config.jwt_secret.clone(),
        config.jwt_issuer.clone(),
        config.access_token_ttl_seconds,
        config.refresh_token_ttl_seconds,
    );
    let sms = Arc::new(SmsController::new(cache.clone(), Box::new(NoopSender), support::sms_config(&config)));
    let login_limiter = Arc::new(LoginLimiter::new(cache, support::login_limiter_config(&config)));

    AuthOrchestrator::new(pool, codec, sms, login_limiter, config)
}

/// Scenario 2: with `max_failed_attempts = 3`, the first three wrong-password
/// attempts return `WrongPassword`; attempts after that return
/// `AccountLocked` until `lock_duration_seconds` elapses, at which point the
/// correct password succeeds.
#[tokio::test]
async fn repeated_bad_password_locks_the_account_until_cooldown_elapses() {
    let _guard = support::env_guard();
    let orchestrator = build_orchestrator().await;
    let mobile = "13900000002";

    // Register out-of-band through the cache-verified SMS path isn't needed
    // here; the limiter acts per-mobile regardless of whether the account
    // exists, so seed a real account with a known password directly.
    let config = support::test_config();
    let pool = support::test_pool(&config).await;
    let hash = authd::utils::password::hash_password("Correct1!").expect("hash password");
    authd::repositories::user::insert(&pool, mobile, &hash, "frank")
        .await
        .expect("seed user");

    for _ in 0..3 {
        let result = orchestrator.login_by_password(mobile, "WRONG").await;
        assert!(matches!(
            result,
            Err(e) if e.code().as_u32() == ErrorCode::WrongPassword.as_u32()
        ));
    }

    for _ in 0..2 {
        let result = orchestrator.login_by_password(mobile, "WRONG").await;
        assert!(matches!(
            result,
            Err(e) if e.code().as_u32() == ErrorCode::AccountLocked.as_u32()
        ));
    }

    // the lock also blocks the *correct* password while active
    let still_locked = orchestrator.login_by_password(mobile, "Correct1!").await;
    assert!(matches!(
        still_locked,
        Err(e) if e.code().as_u32() == ErrorCode::AccountLocked.as_u32()
    ));

    tokio::time::sleep(std::time::Duration::from_secs(
        config.login_lock_duration_seconds as u64 + 1,
    ))
    .await;

    let recovered = orchestrator.login_by_password(mobile, "Correct1!").await;
    assert!(recovered.is_ok());
}

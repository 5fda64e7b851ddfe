use std::sync::Arc;

use authd::auth::login_limiter::LoginLimiter;
use authd::auth::orchestrator::AuthOrchestrator;
use authd::sms::controller::{SmsController, SmsSender};
use authd::token::codec::TokenCodec;
use async_trait::async_trait;

#[path = "support/mod.rs"]
mod support;

/// Captures the last code sent per mobile so tests can read it back instead
/// of guessing — mirrors how the orchestrator is wired in `main.rs`, just
/// with a spy in place of `LoggingSmsSender`.
struct CapturingSender {
    codes: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

impl CapturingSender {
    fn new() -> Self {
        Self {
            codes: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn last_code(&self, mobile: &str) -> String {
        self.codes.lock().unwrap().get(mobile).cloned().expect("a code was sent")
    }
}

async fn build_orchestrator() -> (AuthOrchestrator, Arc<CapturingSender>) {
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

    let sender = Arc::new(CapturingSender::new());
    let sms = Arc::new(SmsController::new(
        cache.clone(),
        Box::new(SenderHandle(sender.clone())),
        support::sms_config(&config),
    ));
    let login_limiter = Arc::new(LoginLimiter::new(cache, support::login_limiter_config(&config)));

    (AuthOrchestrator::new(pool, codec, sms, login_limiter, config), sender)
}

/// `Box<dyn SmsSender>` needs an owned type; this just forwards to the `Arc`.
struct SenderHandle(Arc<CapturingSender>);

#[async_trait]
impl SmsSender for SenderHandle {
    async fn send(&self, mobile: &str, code: &str) -> anyhow::Result<()> {
        self.0.send(mobile, code).await
    }
}

/// Scenario 1: happy-path register then login, tokens differ.
#[tokio::test]
async fn register_then_login_yields_fresh_tokens() {
    let _guard = support::env_guard();
    let (orchestrator, sender) = build_orchestrator().await;

    let mobile = "13900000001";
    orchestrator
        .send_verification_code(authd::models::SmsScene::Register, mobile)
        .await
        .expect("issue register code");
    let code = sender.last_code(mobile);

    let registered = orchestrator
        .register(mobile, &code, "Aa1!aaaa", "alice")
        .await
        .expect("register succeeds");

    let logged_in = orchestrator
        .login_by_password(mobile, "Aa1!aaaa")
        .await
        .expect("login succeeds");

    assert_ne!(registered.tokens.access, logged_in.tokens.access);
    assert_ne!(registered.tokens.refresh, logged_in.tokens.refresh);
    assert_eq!(registered.user.mobile, logged_in.user.mobile);
}

/// Scenario 4: refresh rotation invalidates the old refresh token.
#[tokio::test]
async fn refresh_rotation_revokes_the_old_refresh_token() {
    let _guard = support::env_guard();
    let (orchestrator, sender) = build_orchestrator().await;

    let mobile = "13900000004";
    orchestrator
        .send_verification_code(authd::models::SmsScene::Register, mobile)
        .await
        .unwrap();
    let code = sender.last_code(mobile);
    orchestrator.register(mobile, &code, "Aa1!aaaa", "dave").await.unwrap();

    orchestrator
        .send_verification_code(authd::models::SmsScene::Login, mobile)
        .await
        .unwrap();
    let login_code = sender.last_code(mobile);
    let first = orchestrator.login_by_code(mobile, &login_code).await.unwrap();

    let second = orchestrator.refresh_token(&first.tokens.refresh).await.expect("first refresh succeeds");
    assert_ne!(second.refresh, first.tokens.refresh);

    let retry = orchestrator.refresh_token(&first.tokens.refresh).await;
    assert!(matches!(
        retry,
        Err(e) if e.code().as_u32() == authd::error::ErrorCode::TokenRevoked.as_u32()
    ));

    let third = orchestrator.refresh_token(&second.refresh).await.expect("second refresh succeeds");
    assert_ne!(third.refresh, second.refresh);
}

/// Scenario 5: resetting the password revokes every previously issued refresh.
#[tokio::test]
async fn reset_password_revokes_all_outstanding_sessions() {
    let _guard = support::env_guard();
    let (orchestrator, sender) = build_orchestrator().await;

    let mobile = "13900000005";
    orchestrator
        .send_verification_code(authd::models::SmsScene::Register, mobile)
        .await
        .unwrap();
    let code = sender.last_code(mobile);
    orchestrator.register(mobile, &code, "Aa1!aaaa", "erin").await.unwrap();

    let session_a = orchestrator.login_by_password(mobile, "Aa1!aaaa").await.unwrap();
    let session_b = orchestrator.login_by_password(mobile, "Aa1!aaaa").await.unwrap();

    orchestrator
        .send_verification_code(authd::models::SmsScene::ResetPassword, mobile)
        .await
        .unwrap();
    let reset_code = sender.last_code(mobile);
    orchestrator
        .reset_password(mobile, &reset_code, "NewAa1!aa")
        .await
        .expect("reset succeeds");

    for tokens in [&session_a.tokens, &session_b.tokens] {
        let result = orchestrator.refresh_token(&tokens.refresh).await;
        assert!(matches!(
            result,
            Err(e) if e.code().as_u32() == authd::error::ErrorCode::TokenRevoked.as_u32()
        ));
    }
}

/// Scenario 3: issuing a second code before the cooldown elapses is rate limited.
#[tokio::test]
async fn sms_resend_within_cooldown_is_rate_limited() {
    let _guard = support::env_guard();
    let (orchestrator, _sender) = build_orchestrator().await;

    let mobile = "13900000003";
    let first = orchestrator
        .send_verification_code(authd::models::SmsScene::Login, mobile)
        .await
        .expect("first issue succeeds");
    assert!(first > 0);

    let second = orchestrator.send_verification_code(authd::models::SmsScene::Login, mobile).await;
    assert!(matches!(
        second,
        Err(e) if e.code().as_u32() == authd::error::ErrorCode::RateLimited.as_u32()
    ));
}

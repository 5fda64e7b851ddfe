//! Per-(scene, subject) one-time SMS code lifecycle (§4.E).
//!
//! Four cache key families carry all controller state; there is no
//! relational storage here. Delivery itself is delegated through
//! [`SmsSender`], a narrow trait seam matching the source's `SmsService`
//! interface (§9) — this crate ships only a logging stub since the actual
//! gateway integration is an external collaborator.

use async_trait::async_trait;
use rand::RngCore;

use crate::cache::CacheClient;
use crate::error::{AppError, ErrorCode};
use crate::models::SmsScene;

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, mobile: &str, code: &str) -> anyhow::Result<()>;
}

/// Stub sender used where no real gateway is wired up; logs and succeeds.
pub struct LoggingSmsSender;

#[async_trait]
impl SmsSender for LoggingSmsSender {
    async fn send(&self, mobile: &str, code: &str) -> anyhow::Result<()> {
        tracing::info!(mobile, code, "sms code dispatched (stub sender)");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SmsControllerConfig {
    pub code_len: usize,
    pub code_ttl_seconds: i64,
    pub send_interval_seconds: i64,
    pub max_retry_count: u32,
    pub retry_ttl_seconds: i64,
    pub lock_seconds: i64,
}

pub struct SmsController {
    cache: CacheClient,
    sender: Box<dyn SmsSender>,
    config: SmsControllerConfig,
}

fn code_key(scene: SmsScene, mobile: &str) -> String {
    format!("sms:code:{}:{}", scene, mobile)
}

fn cooldown_key(mobile: &str) -> String {
    format!("sms:interval:{}", mobile)
}

fn attempts_key(scene: SmsScene, mobile: &str) -> String {
    format!("sms:verify_count:{}:{}", scene, mobile)
}

fn lockout_key(scene: SmsScene, mobile: &str) -> String {
    format!("sms:lock:{}:{}", scene, mobile)
}

/// Bitwise constant-time comparison: avoids a short-circuiting `==` that
/// could leak how many leading digits matched via timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

impl SmsController {
    pub fn new(cache: CacheClient, sender: Box<dyn SmsSender>, config: SmsControllerConfig) -> Self {
        assert!(config.code_ttl_seconds > 0, "code_ttl_seconds must be positive");
        Self { cache, sender, config }
    }

    fn generate_code(&self) -> String {
        let modulus = 10u64.pow(self.config.code_len as u32);
        let value = rand::rngs::OsRng.next_u64() % modulus;
        format!("{:0width$}", value, width = self.config.code_len)
    }

    /// Returns the send-interval so the caller can display a cooldown timer.
    pub async fn issue(&self, scene: SmsScene, mobile: &str) -> Result<i64, AppError> {
        if self.cache.exists(&lockout_key(scene, mobile)).await? {
            let ttl = self.cache.ttl(&lockout_key(scene, mobile)).await?;
            return Err(AppError::new(
                ErrorCode::RateLimited,
                format!("locked out for {} more seconds", ttl.max(0)),
            ));
        }
        if self.cache.exists(&cooldown_key(mobile)).await? {
            let ttl = self.cache.ttl(&cooldown_key(mobile)).await?;
            return Err(AppError::new(
                ErrorCode::RateLimited,
                format!("resend available in {} seconds", ttl.max(0)),
            ));
        }

        let code = self.generate_code();
        self.cache
            .set_with_ttl(&code_key(scene, mobile), &code, self.config.code_ttl_seconds)
            .await?;

        if let Err(err) = self
            .cache
            .set_with_ttl(&cooldown_key(mobile), "1", self.config.send_interval_seconds)
            .await
        {
            tracing::warn!(mobile, error = ?err, "failed to set sms cooldown, continuing");
        }

        if let Err(err) = self.sender.send(mobile, &code).await {
            tracing::error!(mobile, error = ?err, "sms delivery failed, compensating");
            let _ = self.cache.del(&code_key(scene, mobile)).await;
            return Err(AppError::new(ErrorCode::ServiceUnavailable, "sms delivery failed"));
        }

        Ok(self.config.send_interval_seconds)
    }

    pub async fn verify(&self, scene: SmsScene, mobile: &str, supplied: &str) -> Result<(), AppError> {
        if self.cache.exists(&lockout_key(scene, mobile)).await? {
            let ttl = self.cache.ttl(&lockout_key(scene, mobile)).await?;
            return Err(AppError::new(
                ErrorCode::AccountLocked,
                format!("locked out for {} more minutes", (ttl.max(0) + 59) / 60),
            ));
        }

        let stored = self
            .cache
            .get(&code_key(scene, mobile))
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::CaptchaExpired, "code expired or not issued"))?;

        if constant_time_eq(&stored, supplied) {
            let _ = self.cache.del(&attempts_key(scene, mobile)).await;
            return Ok(());
        }

        let count = self.cache.incr(&attempts_key(scene, mobile)).await?;
        if let Err(err) = self
            .cache
            .expire(&attempts_key(scene, mobile), self.config.retry_ttl_seconds)
            .await
        {
            tracing::warn!(mobile, error = ?err, "failed to set attempts ttl, continuing");
        }

        if count as u32 >= self.config.max_retry_count {
            self.cache
                .set_with_ttl(&lockout_key(scene, mobile), "1", self.config.lock_seconds)
                .await?;
            let _ = self.cache.del(&code_key(scene, mobile)).await;
            let _ = self.cache.del(&attempts_key(scene, mobile)).await;
            return Err(AppError::new(
                ErrorCode::AccountLocked,
                format!("too many attempts, locked for {} minutes", (self.config.lock_seconds + 59) / 60),
            ));
        }

        Err(AppError::new(
            ErrorCode::CaptchaWrong,
            format!("wrong code, {} attempts remaining", self.config.max_retry_count - count as u32),
        ))
    }

    /// Unconditional delete; called by the orchestrator after the business
    /// success that accepted the verified code.
    pub async fn consume(&self, scene: SmsScene, mobile: &str) -> Result<(), AppError> {
        self.cache.del(&code_key(scene, mobile)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_rejects_different_lengths_and_content() {
        assert!(constant_time_eq("123456", "123456"));
        assert!(!constant_time_eq("123456", "123457"));
        assert!(!constant_time_eq("123456", "1234567"));
    }

    #[test]
    fn cache_keys_match_the_documented_families() {
        assert_eq!(code_key(SmsScene::Login, "13900000003"), "sms:code:login:13900000003");
        assert_eq!(cooldown_key("13900000003"), "sms:interval:13900000003");
        assert_eq!(
            attempts_key(SmsScene::Login, "13900000003"),
            "sms:verify_count:login:13900000003"
        );
        assert_eq!(lockout_key(SmsScene::Login, "13900000003"), "sms:lock:login:13900000003");
    }

    #[test]
    fn code_generation_is_zero_padded_to_configured_length() {
        // generate_code is deterministic in shape (not value): always
        // `code_len` decimal digits regardless of the random draw.
        for width in [4usize, 6, 8] {
            let modulus = 10u64.pow(width as u32);
            let sample = 42u64 % modulus;
            let formatted = format!("{:0width$}", sample, width = width);
            assert_eq!(formatted.len(), width);
        }
    }
}

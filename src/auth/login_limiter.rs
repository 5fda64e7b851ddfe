//! Login-attempt limiter (§4.F.1): sliding failure count → account lockout.

use crate::cache::CacheClient;
use crate::error::{AppError, ErrorCode};

fn failed_key(mobile: &str) -> String {
    format!("login:failed:{}", mobile)
}

fn lock_key(mobile: &str) -> String {
    format!("login:lock:{}", mobile)
}

#[derive(Debug, Clone, Copy)]
pub struct LoginLimiterConfig {
    pub max_failed_attempts: u32,
    pub failed_attempts_window_seconds: i64,
    pub lock_duration_seconds: i64,
}

pub struct LoginLimiter {
    cache: CacheClient,
    config: LoginLimiterConfig,
}

impl LoginLimiter {
    pub fn new(cache: CacheClient, config: LoginLimiterConfig) -> Self {
        Self { cache, config }
    }

    /// If the lock key exists, fails `AccountLocked` with its residual ttl.
    pub async fn check(&self, mobile: &str) -> Result<(), AppError> {
        if self.cache.exists(&lock_key(mobile)).await? {
            let ttl = self.cache.ttl(&lock_key(mobile)).await?;
            return Err(AppError::new(
                ErrorCode::AccountLocked,
                format!("account locked for {} more seconds", ttl.max(0)),
            ));
        }
        Ok(())
    }

    /// Increments the failure counter, arming its TTL on first increment,
    /// and escalates to a lock once the threshold is reached.
    pub async fn record_failure(&self, mobile: &str) -> Result<(), AppError> {
        let count = self.cache.incr(&failed_key(mobile)).await?;
        if count == 1 {
            self.cache
                .expire(&failed_key(mobile), self.config.failed_attempts_window_seconds)
                .await?;
        }
        if count as u32 >= self.config.max_failed_attempts {
            self.cache
                .set_with_ttl(&lock_key(mobile), "1", self.config.lock_duration_seconds)
                .await?;
        }
        Ok(())
    }

    pub async fn clear(&self, mobile: &str) -> Result<(), AppError> {
        self.cache.del(&failed_key(mobile)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_matches_the_documented_families() {
        assert_eq!(failed_key("13900000002"), "login:failed:13900000002");
        assert_eq!(lock_key("13900000002"), "login:lock:13900000002");
    }
}

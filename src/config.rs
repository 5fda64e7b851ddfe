//! Runtime configuration, loaded from `.env` + process environment.
//!
//! Every key in spec §6's configuration table gets a field; the literal
//! environment-variable overrides from that section are honored even
//! though the relational backend here is Postgres rather than MySQL — the
//! override name is a wire contract the loader respects regardless of the
//! backing engine.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // mysql.* (backed by Postgres)
    pub db_host: String,
    pub db_port: u16,
    pub db_database: String,
    pub db_username: String,
    pub db_password: String,
    pub db_pool_size: u32,
    pub db_connect_timeout_ms: u64,
    pub db_acquire_timeout_ms: u64,
    pub db_max_retries: u32,
    pub db_retry_interval_ms: u64,
    pub db_auto_reconnect: bool,
    pub db_charset: String,

    // redis.*
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: Option<String>,
    pub redis_db: u8,
    pub redis_pool_size: u32,
    pub redis_connect_timeout_ms: u64,
    pub redis_wait_timeout_ms: u64,

    // security.*
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,

    // sms.*
    pub sms_code_len: usize,
    pub sms_code_ttl_seconds: i64,
    pub sms_send_interval_seconds: i64,
    pub sms_max_retry_count: u32,
    pub sms_retry_ttl_seconds: i64,
    pub sms_lock_seconds: i64,

    // login.*
    pub login_max_failed_attempts: u32,
    pub login_failed_attempts_window_seconds: i64,
    pub login_lock_duration_seconds: i64,
    pub login_max_sessions_per_user: u32,

    // password.*
    pub password_min_length: usize,
    pub password_max_length: usize,
    pub password_require_uppercase: bool,
    pub password_require_lowercase: bool,
    pub password_require_digit: bool,
    pub password_require_special_char: bool,

    // zookeeper.*
    pub zk_hosts: String,
    pub zk_session_timeout_ms: u64,
    pub zk_enabled: bool,
    pub zk_root_path: String,
    pub zk_service_name: String,
    pub zk_register_self: bool,
    pub zk_weight: i64,

    // plumbing
    pub self_host: String,
    pub self_port: u16,
    pub sweeper_interval_minutes: u64,
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let jwt_secret = env_string("JWT_SECRET", "");
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be set and at least 32 bytes long");
        }

        Ok(Config {
            db_host: env_string("MYSQL_HOST", "127.0.0.1"),
            db_port: env_parse("MYSQL_PORT", 5432),
            db_database: env_string("MYSQL_DATABASE", "authd"),
            db_username: env_string("MYSQL_USERNAME", "authd"),
            db_password: env_string("MYSQL_PASSWORD", ""),
            db_pool_size: env_parse("MYSQL_POOL_SIZE", 10),
            db_connect_timeout_ms: env_parse("MYSQL_CONNECT_TIMEOUT_MS", 5_000),
            db_acquire_timeout_ms: env_parse("MYSQL_ACQUIRE_TIMEOUT_MS", 5_000),
            db_max_retries: env_parse("MYSQL_MAX_RETRIES", 3),
            db_retry_interval_ms: env_parse("MYSQL_RETRY_INTERVAL_MS", 200),
            db_auto_reconnect: env_parse("MYSQL_AUTO_RECONNECT", true),
            db_charset: env_string("MYSQL_CHARSET", "utf8mb4"),

            redis_host: env_string("REDIS_HOST", "127.0.0.1"),
            redis_port: env_parse("REDIS_PORT", 6379),
            redis_password: env::var("REDIS_PASSWORD").ok(),
            redis_db: env_parse("REDIS_DB", 0),
            redis_pool_size: env_parse("REDIS_POOL_SIZE", 10),
            redis_connect_timeout_ms: env_parse("REDIS_CONNECT_TIMEOUT_MS", 3_000),
            redis_wait_timeout_ms: env_parse("REDIS_WAIT_TIMEOUT_MS", 3_000),

            jwt_secret,
            jwt_issuer: env_string("JWT_ISSUER", "authd"),
            access_token_ttl_seconds: env_parse("ACCESS_TOKEN_TTL_SECONDS", 900),
            refresh_token_ttl_seconds: env_parse("REFRESH_TOKEN_TTL_SECONDS", 30 * 24 * 3600),

            sms_code_len: env_parse("SMS_CODE_LEN", 6),
            sms_code_ttl_seconds: env_parse("SMS_CODE_TTL_SECONDS", 300),
            sms_send_interval_seconds: env_parse("SMS_SEND_INTERVAL_SECONDS", 60),
            sms_max_retry_count: env_parse("SMS_MAX_RETRY_COUNT", 5),
            sms_retry_ttl_seconds: env_parse("SMS_RETRY_TTL_SECONDS", 300),
            sms_lock_seconds: env_parse("SMS_LOCK_SECONDS", 600),

            login_max_failed_attempts: env_parse("LOGIN_MAX_FAILED_ATTEMPTS", 5),
            login_failed_attempts_window_seconds: env_parse(
                "LOGIN_FAILED_ATTEMPTS_WINDOW_SECONDS",
                900,
            ),
            login_lock_duration_seconds: env_parse("LOGIN_LOCK_DURATION_SECONDS", 900),
            login_max_sessions_per_user: env_parse("LOGIN_MAX_SESSIONS_PER_USER", 10),

            password_min_length: env_parse("PASSWORD_MIN_LENGTH", 8),
            password_max_length: env_parse("PASSWORD_MAX_LENGTH", 72),
            password_require_uppercase: env_parse("PASSWORD_REQUIRE_UPPERCASE", true),
            password_require_lowercase: env_parse("PASSWORD_REQUIRE_LOWERCASE", true),
            password_require_digit: env_parse("PASSWORD_REQUIRE_DIGIT", true),
            password_require_special_char: env_parse("PASSWORD_REQUIRE_SPECIAL_CHAR", false),

            zk_hosts: env_string("ZK_HOSTS", ""),
            zk_session_timeout_ms: env_parse("ZK_SESSION_TIMEOUT_MS", 10_000),
            zk_enabled: env_parse("ZK_ENABLED", false),
            zk_root_path: env_string("ZK_ROOT_PATH", "/services"),
            zk_service_name: env_string("ZK_SERVICE_NAME", "auth-service"),
            zk_register_self: env_parse("ZK_REGISTER_SELF", true),
            zk_weight: env_parse("ZK_WEIGHT", 1),

            self_host: env_string("SELF_HOST", "127.0.0.1"),
            self_port: env_parse("SELF_PORT", 8080),
            sweeper_interval_minutes: env_parse("SWEEPER_INTERVAL_MINUTES", 5),
        })
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_username, self.db_password, self.db_host, self.db_port, self.db_database
        )
    }

    pub fn redis_url(&self) -> String {
        match &self.redis_password {
            Some(pw) => format!(
                "redis://:{}@{}:{}/{}",
                pw, self.redis_host, self.redis_port, self.redis_db
            ),
            None => format!("redis://{}:{}/{}", self.redis_host, self.redis_port, self.redis_db),
        }
    }

    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.db_connect_timeout_ms)
    }

    pub fn db_acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.db_acquire_timeout_ms)
    }

    pub fn redis_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_guard() -> std::sync::MutexGuard<'static, ()> {
        ENV_MUTEX.get_or_init(|| Mutex::new(())).lock().expect("lock env")
    }

    #[test]
    fn load_fails_without_jwt_secret() {
        let _guard = env_guard();
        env::remove_var("JWT_SECRET");
        let result = Config::load();
        assert!(result.is_err());
    }

    #[test]
    fn load_fails_with_short_jwt_secret() {
        let _guard = env_guard();
        env::set_var("JWT_SECRET", "too-short");
        let result = Config::load();
        assert!(result.is_err());
        env::remove_var("JWT_SECRET");
    }

    #[test]
    fn load_succeeds_with_defaults() {
        let _guard = env_guard();
        env::set_var("JWT_SECRET", "a".repeat(32));
        let config = Config::load().expect("config loads");
        assert_eq!(config.sms_code_len, 6);
        assert_eq!(config.login_max_failed_attempts, 5);
        assert!(config.database_url().starts_with("postgres://"));
        env::remove_var("JWT_SECRET");
    }
}

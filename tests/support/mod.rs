#![allow(dead_code)]
use std::{
    env, fs,
    net::TcpListener,
    path::{Path, PathBuf},
    process::Command,
    sync::{Mutex, OnceLock},
    time::Duration as StdDuration,
};

use authd::{auth::login_limiter::LoginLimiterConfig, config::Config, sms::controller::SmsControllerConfig};
use ctor::{ctor, dtor};
use sqlx::{postgres::PgPoolOptions, PgPool};
use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage, RunnableImage};

static TESTCONTAINERS_DOCKER: OnceLock<&'static Cli> = OnceLock::new();
static TESTCONTAINERS_PG: OnceLock<Mutex<Option<Container<'static, GenericImage>>>> = OnceLock::new();
static TESTCONTAINERS_REDIS: OnceLock<Mutex<Option<Container<'static, GenericImage>>>> = OnceLock::new();
static POSTGRES_PORT: OnceLock<u16> = OnceLock::new();
static REDIS_PORT: OnceLock<u16> = OnceLock::new();
static DOCKER_WRAPPER_DIR: OnceLock<PathBuf> = OnceLock::new();
static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

#[ctor]
fn init_test_backends() {
    ensure_docker_cli();
    start_postgres();
    start_redis();
}

#[dtor]
fn shutdown_test_backends() {
    if let Some(holder) = TESTCONTAINERS_PG.get() {
        if let Ok(mut guard) = holder.lock() {
            let _ = guard.take();
        }
    }
    if let Some(holder) = TESTCONTAINERS_REDIS.get() {
        if let Ok(mut guard) = holder.lock() {
            let _ = guard.take();
        }
    }
}

pub fn env_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_MUTEX.get_or_init(|| Mutex::new(())).lock().expect("lock env")
}

fn allocate_ephemeral_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .expect("read socket addr")
        .port()
}

fn ensure_docker_cli() {
    if env::var("DOCKER_HOST").is_err() {
        let podman_socket = Path::new("/run/podman/podman.sock");
        if podman_socket.exists() {
            env::set_var("DOCKER_HOST", "unix:///run/podman/podman.sock");
        } else if let Ok(runtime_dir) = env::var("XDG_RUNTIME_DIR") {
            let path = Path::new(&runtime_dir).join("podman/podman.sock");
            if path.exists() {
                if let Some(path_str) = path.to_str() {
                    env::set_var("DOCKER_HOST", format!("unix://{}", path_str));
                }
            }
        }
    }
    if Command::new("docker").arg("--version").output().is_ok() {
        return;
    }
    if Command::new("podman").arg("--version").output().is_err() {
        return;
    }
    let dir = DOCKER_WRAPPER_DIR.get_or_init(|| {
        let dir = env::temp_dir().join("authd-testcontainers-docker");
        let _ = fs::create_dir_all(&dir);
        dir
    });
    let docker_path = dir.join("docker");
    if !docker_path.exists() {
        let script = "#!/usr/bin/env sh\nexec podman \"$@\"\n";
        let _ = fs::write(&docker_path, script);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = fs::metadata(&docker_path) {
                let mut perms = metadata.permissions();
                perms.set_mode(0o755);
                let _ = fs::set_permissions(&docker_path, perms);
            }
        }
    }
    let path = env::var("PATH").unwrap_or_default();
    let new_path = format!("{}:{}", dir.display(), path);
    env::set_var("PATH", new_path);
}

fn start_postgres() -> u16 {
    *POSTGRES_PORT.get_or_init(|| {
        let docker = TESTCONTAINERS_DOCKER.get_or_init(|| Box::leak(Box::new(Cli::default())));
        let host_port = allocate_ephemeral_port();
        let image = GenericImage::new("postgres", "15-alpine")
            .with_env_var("POSTGRES_USER", "authd_test")
            .with_env_var("POSTGRES_PASSWORD", "authd_test")
            .with_env_var("POSTGRES_DB", "authd_test")
            .with_wait_for(WaitFor::message_on_stdout(
                "database system is ready to accept connections",
            ));
        let image = RunnableImage::from(image).with_mapped_port((host_port, 5432));
        let container = docker.run(image);
        let holder = TESTCONTAINERS_PG.get_or_init(|| Mutex::new(None));
        *holder.lock().expect("lock testcontainers postgres") = Some(container);
        host_port
    })
}

fn start_redis() -> u16 {
    *REDIS_PORT.get_or_init(|| {
        let docker = TESTCONTAINERS_DOCKER.get_or_init(|| Box::leak(Box::new(Cli::default())));
        let host_port = allocate_ephemeral_port();
        let image = GenericImage::new("redis", "7-alpine")
            .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
        let image = RunnableImage::from(image).with_mapped_port((host_port, 6379));
        let container = docker.run(image);
        let holder = TESTCONTAINERS_REDIS.get_or_init(|| Mutex::new(None));
        *holder.lock().expect("lock testcontainers redis") = Some(container);
        host_port
    })
}

/// A [`Config`] pointed at the shared, lazily-started Postgres/Redis
/// testcontainers, with short windows/TTLs so lockout/cooldown scenarios
/// don't force multi-second sleeps in the test suite.
pub fn test_config() -> Config {
    Config {
        db_host: "127.0.0.1".into(),
        db_port: start_postgres(),
        db_database: "authd_test".into(),
        db_username: "authd_test".into(),
        db_password: "authd_test".into(),
        db_pool_size: 5,
        db_connect_timeout_ms: 5_000,
        db_acquire_timeout_ms: 5_000,
        db_max_retries: 3,
        db_retry_interval_ms: 200,
        db_auto_reconnect: true,
        db_charset: "utf8mb4".into(),

        redis_host: "127.0.0.1".into(),
        redis_port: start_redis(),
        redis_password: None,
        redis_db: 0,
        redis_pool_size: 5,
        redis_connect_timeout_ms: 3_000,
        redis_wait_timeout_ms: 3_000,

        jwt_secret: "a-test-secret-that-is-long-enough-1234567890".into(),
        jwt_issuer: "authd-test".into(),
        access_token_ttl_seconds: 900,
        refresh_token_ttl_seconds: 1_209_600,

        sms_code_len: 6,
        sms_code_ttl_seconds: 300,
        sms_send_interval_seconds: 60,
        sms_max_retry_count: 3,
        sms_retry_ttl_seconds: 600,
        sms_lock_seconds: 2,

        login_max_failed_attempts: 3,
        login_failed_attempts_window_seconds: 900,
        login_lock_duration_seconds: 2,
        login_max_sessions_per_user: 10,

        password_min_length: 8,
        password_max_length: 72,
        password_require_uppercase: true,
        password_require_lowercase: true,
        password_require_digit: true,
        password_require_special_char: true,

        zk_hosts: String::new(),
        zk_session_timeout_ms: 10_000,
        zk_enabled: false,
        zk_root_path: "/services".into(),
        zk_service_name: "authd".into(),
        zk_register_self: false,
        zk_weight: 1,

        self_host: "127.0.0.1".into(),
        self_port: 0,
        sweeper_interval_minutes: 1,
    }
}

pub fn sms_config(config: &Config) -> SmsControllerConfig {
    SmsControllerConfig {
        code_len: config.sms_code_len,
        code_ttl_seconds: config.sms_code_ttl_seconds,
        send_interval_seconds: config.sms_send_interval_seconds,
        max_retry_count: config.sms_max_retry_count,
        retry_ttl_seconds: config.sms_retry_ttl_seconds,
        lock_seconds: config.sms_lock_seconds,
    }
}

pub fn login_limiter_config(config: &Config) -> LoginLimiterConfig {
    LoginLimiterConfig {
        max_failed_attempts: config.login_max_failed_attempts,
        failed_attempts_window_seconds: config.login_failed_attempts_window_seconds,
        lock_duration_seconds: config.login_lock_duration_seconds,
    }
}

pub async fn test_pool(config: &Config) -> PgPool {
    let mut attempts = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(config.db_pool_size)
            .acquire_timeout(config.db_acquire_timeout())
            .connect(&config.database_url())
            .await
        {
            Ok(pool) if sqlx::query("SELECT 1").execute(&pool).await.is_ok() => {
                sqlx::migrate!("./migrations").run(&pool).await.expect("run migrations");
                return pool;
            }
            _ if attempts >= 40 => panic!("postgres never became ready"),
            _ => {}
        }
        attempts += 1;
        tokio::time::sleep(StdDuration::from_millis(250)).await;
    }
}

pub async fn test_cache(config: &Config) -> authd::cache::CacheClient {
    let pool = authd::db::redis::create_redis_pool(config)
        .await
        .expect("create redis pool");
    let cache = authd::cache::CacheClient::new(pool);
    for _ in 0..40 {
        if cache.ping().await.is_ok() {
            return cache;
        }
        tokio::time::sleep(StdDuration::from_millis(250)).await;
    }
    panic!("redis never became ready");
}

pub async fn truncate_all(pool: &PgPool) {
    sqlx::query("TRUNCATE user_sessions, users RESTART IDENTITY CASCADE")
        .execute(pool)
        .await
        .expect("truncate tables");
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use authd::auth::login_limiter::{LoginLimiter, LoginLimiterConfig};
use authd::auth::orchestrator::AuthOrchestrator;
use authd::cache::CacheClient;
use authd::config::Config;
use authd::db::{connection::create_pool, redis::create_redis_pool};
use authd::handlers;
use authd::middleware as mw;
use authd::models::ServiceInstance;
use authd::registry::discovery::ServiceDiscovery;
use authd::registry::ServiceRegistry;
use authd::sms::controller::{LoggingSmsSender, SmsController, SmsControllerConfig};
use authd::state::AppState;
use authd::sweeper::Sweeper;
use authd::token::codec::TokenCodec;

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

struct NoopWatcher;

impl zookeeper::Watcher for NoopWatcher {
    fn handle(&self, event: zookeeper::WatchedEvent) {
        tracing::debug!(?event, "zk session event");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authd=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        database_url = %config.database_url(),
        jwt_secret = %mask_secret(&config.jwt_secret),
        access_token_ttl_seconds = config.access_token_ttl_seconds,
        refresh_token_ttl_seconds = config.refresh_token_ttl_seconds,
        "loaded configuration from environment/.env"
    );

    let pool = create_pool(&config).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis_pool = create_redis_pool(&config).await?;
    let cache = CacheClient::new(redis_pool);

    let codec = TokenCodec::new(
        config.jwt_secret.clone(),
        config.jwt_issuer.clone(),
        config.access_token_ttl_seconds,
        config.refresh_token_ttl_seconds,
    );

    let sms = Arc::new(SmsController::new(
        cache.clone(),
        Box::new(LoggingSmsSender),
        SmsControllerConfig {
            code_len: config.sms_code_len,
            code_ttl_seconds: config.sms_code_ttl_seconds,
            send_interval_seconds: config.sms_send_interval_seconds,
            max_retry_count: config.sms_max_retry_count,
            retry_ttl_seconds: config.sms_retry_ttl_seconds,
            lock_seconds: config.sms_lock_seconds,
        },
    ));

    let login_limiter = Arc::new(LoginLimiter::new(
        cache.clone(),
        LoginLimiterConfig {
            max_failed_attempts: config.login_max_failed_attempts,
            failed_attempts_window_seconds: config.login_failed_attempts_window_seconds,
            lock_duration_seconds: config.login_lock_duration_seconds,
        },
    ));

    let orchestrator = Arc::new(AuthOrchestrator::new(
        pool.clone(),
        codec,
        sms,
        login_limiter,
        config.clone(),
    ));

    let sweeper = Arc::new(Sweeper::new(pool.clone(), config.sweeper_interval_minutes));
    sweeper.start().await;

    let (registry, discovery) = if config.zk_enabled {
        let hosts = config.zk_hosts.clone();
        let session_timeout = Duration::from_millis(config.zk_session_timeout_ms);
        let zk = tokio::task::spawn_blocking(move || {
            zookeeper::ZooKeeper::connect(&hosts, session_timeout, NoopWatcher)
        })
        .await??;
        let zk = Arc::new(zk);

        let registry = Arc::new(ServiceRegistry::new(zk.clone(), config.zk_root_path.clone()));
        if config.zk_register_self {
            registry
                .register(ServiceInstance {
                    service_name: config.zk_service_name.clone(),
                    host: config.self_host.clone(),
                    port: config.self_port,
                    weight: config.zk_weight,
                    metadata: Default::default(),
                })
                .await?;
        }

        let discovery = Arc::new(ServiceDiscovery::new(zk, config.zk_root_path.clone()));
        (Some(registry), Some(discovery))
    } else {
        (None, None)
    };

    let state = AppState::new(pool, cache, orchestrator, registry.clone(), discovery, config.clone());

    let public_routes = Router::new()
        .route("/api/auth/sms/send", post(handlers::auth::send_verify_code))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login/password", post(handlers::auth::login_by_password))
        .route("/api/auth/login/code", post(handlers::auth::login_by_code))
        .route("/api/auth/refresh", post(handlers::auth::refresh_token))
        .route("/api/auth/reset-password", post(handlers::auth::reset_password))
        .route("/api/auth/validate", post(handlers::auth::validate_token))
        .route("/healthz", get(handlers::health::liveness))
        .route("/readyz", get(handlers::health::readiness));

    let self_service_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route(
            "/api/users/me",
            get(handlers::user::get_current_user).put(handlers::user::update_current_user),
        )
        .route("/api/users/me/password", put(handlers::user::change_password))
        .route("/api/users/me", axum::routing::delete(handlers::user::delete_current_user));

    let admin_routes = Router::new()
        .route("/api/users/:uuid", get(handlers::user::get_user))
        .route("/api/users", get(handlers::user::list_users))
        .route("/api/users/:uuid/disable", put(handlers::user::set_user_disabled))
        .route_layer(axum_middleware::from_fn(mw::bearer_auth::require_admin));

    let authenticated_routes = self_service_routes
        .merge(admin_routes)
        .route_layer(axum_middleware::from_fn(mw::bearer_auth::require_auth));

    let app = Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .layer(axum_middleware::from_fn(mw::request_id::request_id))
        .layer(axum_middleware::from_fn(mw::logging::log_error_responses))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any)
                    .max_age(Duration::from_secs(24 * 60 * 60)),
            ),
        )
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.self_port));
    tracing::info!(%addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.stop().await;
    if let Some(registry) = registry {
        registry.unregister().await?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! Shared application state threaded through axum handlers and middleware.

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::orchestrator::AuthOrchestrator;
use crate::cache::CacheClient;
use crate::config::Config;
use crate::registry::discovery::ServiceDiscovery;
use crate::registry::ServiceRegistry;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: CacheClient,
    pub orchestrator: Arc<AuthOrchestrator>,
    pub registry: Option<Arc<ServiceRegistry>>,
    pub discovery: Option<Arc<ServiceDiscovery>>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        cache: CacheClient,
        orchestrator: Arc<AuthOrchestrator>,
        registry: Option<Arc<ServiceRegistry>>,
        discovery: Option<Arc<ServiceDiscovery>>,
        config: Config,
    ) -> Self {
        Self {
            pool,
            cache,
            orchestrator,
            registry,
            discovery,
            config,
        }
    }
}

//! A bounded, blocking-acquire pool over an arbitrary connection factory.
//!
//! This is the spec's own pool primitive (§4.A), kept separate from the
//! `sqlx::PgPool` and `bb8` pools that guard the relational store and the
//! cache — those crates are bounded pools in their own right and are
//! configured, not reimplemented, to carry the same contract for the
//! connections they manage. This module gives the bespoke contract
//! (health-check-on-release, rebuild-on-invalid, scoped leases) a concrete,
//! independently-tested home.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    type Connection: Send;

    async fn create(&self) -> anyhow::Result<Self::Connection>;

    /// Cheap liveness check; `false` forces a rebuild before handing the
    /// connection out (or in place of returning it to the idle queue).
    fn is_valid(&self, conn: &Self::Connection) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub pool_size: usize,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

struct Inner<F: ConnectionFactory> {
    factory: F,
    idle: Mutex<VecDeque<F::Connection>>,
    permits: Semaphore,
}

/// A bounded pool. Clone is cheap (shares the same inner state via `Arc`).
pub struct Pool<F: ConnectionFactory> {
    inner: Arc<Inner<F>>,
}

impl<F: ConnectionFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("timed out waiting for a connection")]
    AcquireTimeout,
    #[error("connection factory failed: {0}")]
    FactoryFailed(anyhow::Error),
}

impl<F: ConnectionFactory + 'static> Pool<F> {
    pub fn new(factory: F, config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                factory,
                idle: Mutex::new(VecDeque::with_capacity(config.pool_size)),
                permits: Semaphore::new(config.pool_size),
            }),
        }
    }

    /// Blocks up to the configured bound for an idle connection, rebuilding
    /// via the factory if none is idle or the idle one failed validation.
    pub async fn acquire(&self, config: &PoolConfig) -> Result<Lease<F>, PoolError> {
        let permit = tokio::time::timeout(config.acquire_timeout, self.inner.permits.acquire())
            .await
            .map_err(|_| PoolError::AcquireTimeout)?
            .expect("semaphore never closed")
            .forget();
        let _ = permit;

        let maybe_conn = {
            let mut idle = self.inner.idle.lock().await;
            idle.pop_front()
        };

        let conn = match maybe_conn {
            Some(conn) if self.inner.factory.is_valid(&conn) => conn,
            Some(_stale) => self.rebuild().await?,
            None => self.rebuild().await?,
        };

        Ok(Lease {
            pool: self.clone(),
            conn: Some(conn),
        })
    }

    async fn rebuild(&self) -> Result<F::Connection, PoolError> {
        self.inner
            .factory
            .create()
            .await
            .map_err(PoolError::FactoryFailed)
    }

    /// Returns a connection to the idle queue, rebuilding it first if it's
    /// no longer valid. A rebuild failure drops the slot's connection (the
    /// permit is still released so the pool doesn't permanently shrink
    /// below `pool_size` worth of *attempts*, even though this one slot's
    /// connection is gone until the next successful acquire rebuilds it).
    async fn release(&self, conn: F::Connection) {
        let conn = if self.inner.factory.is_valid(&conn) {
            Some(conn)
        } else {
            match self.inner.factory.create().await {
                Ok(fresh) => Some(fresh),
                Err(err) => {
                    tracing::warn!(error = ?err, "pool: rebuild on release failed, dropping slot");
                    None
                }
            }
        };

        if let Some(conn) = conn {
            self.inner.idle.lock().await.push_back(conn);
        }
        self.inner.permits.add_permits(1);
    }

    /// Permits not currently leased out. `pool_size - available_permits()`
    /// is the number of outstanding leases.
    pub fn available_permits(&self) -> usize {
        self.inner.permits.available_permits()
    }
}

/// A scoped lease that guarantees release on every exit path, including an
/// early return or panic unwind, via `Drop`.
pub struct Lease<F: ConnectionFactory + 'static> {
    pool: Pool<F>,
    conn: Option<F::Connection>,
}

impl<F: ConnectionFactory + 'static> Lease<F> {
    pub fn get(&self) -> &F::Connection {
        self.conn.as_ref().expect("lease connection present until drop")
    }

    pub fn get_mut(&mut self) -> &mut F::Connection {
        self.conn.as_mut().expect("lease connection present until drop")
    }
}

impl<F: ConnectionFactory + 'static> Drop for Lease<F> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let pool = self.pool.clone();
            tokio::spawn(async move {
                pool.release(conn).await;
            });
        }
    }
}

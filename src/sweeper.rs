//! Background expired-token sweeper (§4.G).
//!
//! A single cooperative worker. `Start` is a no-op if already running;
//! otherwise it atomically flips `running` and spawns the worker, which
//! repeats `SweepExpired` then sleeps `interval_minutes * 60` seconds
//! decomposed into one-second checks against `running` so `Stop` returns
//! within roughly a second. `Stop` is idempotent and safe to call more
//! than once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::repositories::token as token_repo;

pub struct Sweeper {
    pool: PgPool,
    interval_seconds: u64,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Sweeper {
    pub fn new(pool: PgPool, interval_minutes: u64) -> Self {
        Self {
            pool,
            interval_seconds: interval_minutes * 60,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let pool = self.pool.clone();
        let running = self.running.clone();
        let interval_seconds = self.interval_seconds;

        let handle = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                match token_repo::sweep_expired(&pool).await {
                    Ok(count) if count > 0 => tracing::info!(count, "swept expired refresh sessions"),
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = ?err, "sweep_expired failed"),
                }

                let mut slept = 0u64;
                while slept < interval_seconds && running.load(Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    slept += 1;
                }
            }
        });

        *self.handle.lock().await = Some(handle);
    }

    /// Idempotent; safe to call multiple times and from a shutdown path.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

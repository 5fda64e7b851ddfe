//! Service registration (§4.H, registration half) over a ZooKeeper-like
//! coordination service. `zookeeper-rs`'s client API is synchronous, so
//! every call here runs on a blocking task; nothing in this module holds
//! a tokio lock across an `.await` the way the rest of the crate does.

pub mod discovery;

use std::sync::Arc;

use tokio::sync::Mutex;
use zookeeper::{Acl, CreateMode, ZooKeeper};

use crate::error::{AppError, ErrorCode};
use crate::models::ServiceInstance;

pub struct ServiceRegistry {
    zk: Arc<ZooKeeper>,
    root: String,
    state: Mutex<RegistrationState>,
}

#[derive(Default)]
struct RegistrationState {
    current_instance: Option<ServiceInstance>,
    current_path: Option<String>,
    registered: bool,
}

impl ServiceRegistry {
    pub fn new(zk: Arc<ZooKeeper>, root: impl Into<String>) -> Self {
        Self {
            zk,
            root: root.into(),
            state: Mutex::new(RegistrationState::default()),
        }
    }

    /// Registers `inst` as an ephemeral node under `{root}/{service}/{host:port}`.
    /// Ephemerality is the liveness signal — a process death severs the
    /// coordination session, removing the node within one session timeout.
    pub async fn register(&self, inst: ServiceInstance) -> Result<(), AppError> {
        if !inst.is_valid() {
            return Err(AppError::new(ErrorCode::InvalidArgument, "invalid service instance"));
        }

        let zk = self.zk.clone();
        let service_path = format!("{}/{}", self.root, inst.service_name);
        let node_path = format!("{}/{}", service_path, inst.instance_id());
        let body = serde_json::to_vec(&inst).map_err(|err| AppError::new(ErrorCode::Internal, err.to_string()))?;

        let created_path = tokio::task::spawn_blocking(move || -> Result<String, AppError> {
            ensure_persistent_path(&zk, &service_path)?;

            zk.create(
                &node_path,
                body,
                Acl::open_unsafe().clone(),
                CreateMode::Ephemeral,
            )
            .map_err(|err| AppError::new(ErrorCode::ServiceUnavailable, format!("zk create failed: {err}")))
        })
        .await
        .map_err(|err| AppError::new(ErrorCode::Internal, err.to_string()))??;

        let mut state = self.state.lock().await;
        state.current_instance = Some(inst);
        state.current_path = Some(created_path);
        state.registered = true;
        Ok(())
    }

    /// Idempotent.
    pub async fn unregister(&self) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let Some(path) = state.current_path.take() else {
            return Ok(());
        };
        state.registered = false;
        drop(state);

        let zk = self.zk.clone();
        tokio::task::spawn_blocking(move || {
            let _ = zk.delete(&path, None);
        })
        .await
        .map_err(|err| AppError::new(ErrorCode::Internal, err.to_string()))?;
        Ok(())
    }

    pub async fn update(&self, inst: ServiceInstance) -> Result<(), AppError> {
        let state = self.state.lock().await;
        let path = state
            .current_path
            .clone()
            .ok_or_else(|| AppError::new(ErrorCode::Internal, "not registered"))?;
        drop(state);

        let zk = self.zk.clone();
        let body = serde_json::to_vec(&inst).map_err(|err| AppError::new(ErrorCode::Internal, err.to_string()))?;
        tokio::task::spawn_blocking(move || {
            zk.set_data(&path, body, None)
                .map_err(|err| AppError::new(ErrorCode::ServiceUnavailable, format!("zk set_data failed: {err}")))
        })
        .await
        .map_err(|err| AppError::new(ErrorCode::Internal, err.to_string()))??;

        self.state.lock().await.current_instance = Some(inst);
        Ok(())
    }

    pub async fn is_registered(&self) -> bool {
        self.state.lock().await.registered
    }
}

/// Best-effort mirror of `unregister` on every exit path — a panic, an
/// early `?`-return before the cooperative-shutdown call, or a dropped
/// `Arc<ServiceRegistry>` must not leave the ephemeral node registered
/// until the zk session times out. `zookeeper`'s client is already
/// synchronous, so this calls `delete` directly rather than spawning.
impl Drop for ServiceRegistry {
    fn drop(&mut self) {
        let path = match self.state.try_lock() {
            Ok(mut guard) => guard.current_path.take(),
            Err(_) => return,
        };
        if let Some(path) = path {
            let _ = self.zk.delete(&path, None);
        }
    }
}

/// Creates `path` as a persistent node, tolerating the "already exists" race.
fn ensure_persistent_path(zk: &ZooKeeper, path: &str) -> Result<(), AppError> {
    match zk.exists(path, false) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => {
            match zk.create(path, Vec::new(), Acl::open_unsafe().clone(), CreateMode::Persistent) {
                Ok(_) => Ok(()),
                Err(zookeeper::ZkError::NodeExists) => Ok(()),
                Err(err) => Err(AppError::new(
                    ErrorCode::ServiceUnavailable,
                    format!("zk create parent failed: {err}"),
                )),
            }
        }
        Err(err) => Err(AppError::new(
            ErrorCode::ServiceUnavailable,
            format!("zk exists check failed: {err}"),
        )),
    }
}

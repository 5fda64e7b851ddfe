//! Service discovery (§4.H, discovery half): watches peers, caches them,
//! and selects one (uniform or weighted-random).
//!
//! Watches in the coordination protocol are one-shot, so every watch
//! handler re-arms itself as part of processing an event — `refresh`
//! re-installs the watch via `get_children_w` on every call, including the
//! one triggered by the watch firing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rand::Rng;
use zookeeper::{WatchedEvent, Watcher, ZooKeeper};

use crate::error::AppError;
use crate::models::ServiceInstance;

type Callback = Box<dyn Fn(&[ServiceInstance]) + Send + Sync>;

struct Shared {
    zk: Arc<ZooKeeper>,
    root: String,
    cache: RwLock<HashMap<String, Vec<ServiceInstance>>>,
    callbacks: std::sync::Mutex<HashMap<String, Callback>>,
}

/// The watcher trampoline: a closure-equivalent struct capturing the
/// `Arc<Shared>` so its captured state outlives the watch it was
/// registered under.
struct ChildWatcher {
    shared: Arc<Shared>,
    service: String,
}

impl Watcher for ChildWatcher {
    fn handle(&self, _event: WatchedEvent) {
        let shared = self.shared.clone();
        let service = self.service.clone();
        tokio::spawn(async move {
            on_children_changed(shared, &service).await;
        });
    }
}

async fn on_children_changed(shared: Arc<Shared>, service: &str) {
    if let Err(err) = refresh(&shared, service).await {
        tracing::warn!(service, error = ?err, "discovery refresh after watch event failed");
        return;
    }

    // Callback runs after the lock that guards the map is released, so a
    // callback that calls back into Subscribe/Unsubscribe can't re-enter.
    let callback = {
        let callbacks = shared.callbacks.lock().expect("callbacks mutex poisoned");
        callbacks.get(service).map(|_| ())
    };
    if callback.is_some() {
        let instances = get_instances(&shared, service);
        let callbacks = shared.callbacks.lock().expect("callbacks mutex poisoned");
        if let Some(cb) = callbacks.get(service) {
            cb(&instances);
        }
    }
}

async fn refresh(shared: &Arc<Shared>, service: &str) -> Result<(), AppError> {
    let service_path = format!("{}/{}", shared.root, service);
    let zk = shared.zk.clone();
    let watcher = ChildWatcher {
        shared: shared.clone(),
        service: service.to_string(),
    };

    let children = tokio::task::spawn_blocking(move || zk.get_children_w(&service_path, watcher))
        .await
        .map_err(|err| crate::error::AppError::new(crate::error::ErrorCode::Internal, err.to_string()))?
        .unwrap_or_default();

    let mut instances = Vec::with_capacity(children.len());
    for child in children {
        let node_path = format!("{}/{}/{}", shared.root, service, child);
        let zk = shared.zk.clone();
        let data = tokio::task::spawn_blocking(move || zk.get_data(&node_path, false))
            .await
            .map_err(|err| crate::error::AppError::new(crate::error::ErrorCode::Internal, err.to_string()))?;

        match data {
            Ok((bytes, _stat)) => match serde_json::from_slice::<ServiceInstance>(&bytes) {
                Ok(inst) => instances.push(inst),
                Err(err) => tracing::warn!(child, error = ?err, "dropping instance with undecodable body"),
            },
            Err(err) => tracing::warn!(child, error = ?err, "failed to read instance node"),
        }
    }

    shared.cache.write().expect("cache rwlock poisoned").insert(service.to_string(), instances);
    Ok(())
}

fn get_instances(shared: &Arc<Shared>, service: &str) -> Vec<ServiceInstance> {
    shared
        .cache
        .read()
        .expect("cache rwlock poisoned")
        .get(service)
        .cloned()
        .unwrap_or_default()
}

pub struct ServiceDiscovery {
    shared: Arc<Shared>,
}

impl ServiceDiscovery {
    pub fn new(zk: Arc<ZooKeeper>, root: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                zk,
                root: root.into(),
                cache: RwLock::new(HashMap::new()),
                callbacks: std::sync::Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Installs a watch and performs one refresh immediately so callers
    /// don't see an empty list until the first change.
    pub async fn subscribe(
        &self,
        service: &str,
        callback: Option<Callback>,
    ) -> Result<(), AppError> {
        if let Some(cb) = callback {
            self.shared
                .callbacks
                .lock()
                .expect("callbacks mutex poisoned")
                .insert(service.to_string(), cb);
        }
        refresh(&self.shared, service).await
    }

    pub fn unsubscribe(&self, service: &str) {
        self.shared.callbacks.lock().expect("callbacks mutex poisoned").remove(service);
    }

    pub async fn refresh(&self, service: &str) -> Result<(), AppError> {
        refresh(&self.shared, service).await
    }

    pub fn get_instances(&self, service: &str) -> Vec<ServiceInstance> {
        get_instances(&self.shared, service)
    }

    pub fn select_instance(&self, service: &str) -> Option<ServiceInstance> {
        let instances = self.get_instances(service);
        if instances.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..instances.len());
        instances.into_iter().nth(idx)
    }

    /// Weighted random draw: sum the weights `W`; if `W <= 0` fall back to
    /// uniform; else draw `r in [1, W]` and walk the prefix sum.
    pub fn select_instance_weighted(&self, service: &str) -> Option<ServiceInstance> {
        let instances = self.get_instances(service);
        if instances.is_empty() {
            return None;
        }

        let total_weight: i64 = instances.iter().map(|i| i.weight).sum();
        if total_weight <= 0 {
            return self.select_instance(service);
        }

        let draw = rand::thread_rng().gen_range(1..=total_weight);
        let mut running = 0i64;
        for inst in &instances {
            running += inst.weight;
            if draw <= running {
                return Some(inst.clone());
            }
        }
        instances.into_iter().last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn instance(host: &str, weight: i64) -> ServiceInstance {
        ServiceInstance {
            service_name: "user-service".into(),
            host: host.into(),
            port: 8080,
            weight,
            metadata: Map::new(),
        }
    }

    #[test]
    fn weighted_selection_skews_toward_the_heaviest_instance() {
        let instances = vec![instance("a", 10), instance("b", 100), instance("c", 1000)];
        let total_weight: i64 = instances.iter().map(|i| i.weight).sum();

        let mut heavy_wins = 0;
        let mut rng = rand::thread_rng();
        for _ in 0..10_000 {
            let draw = rng.gen_range(1..=total_weight);
            let mut running = 0i64;
            let mut winner = &instances[0];
            for inst in &instances {
                running += inst.weight;
                if draw <= running {
                    winner = inst;
                    break;
                }
            }
            if winner.host == "c" {
                heavy_wins += 1;
            }
        }

        assert!(heavy_wins as f64 / 10_000.0 > 0.85);
    }

    #[test]
    fn zero_total_weight_falls_back_to_uniform_distribution_shape() {
        let instances = vec![instance("a", 0), instance("b", 0)];
        let total_weight: i64 = instances.iter().map(|i| i.weight).sum();
        assert_eq!(total_weight, 0);
    }
}

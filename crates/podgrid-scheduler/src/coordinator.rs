//! Coordinator — runs one scheduling decision under the cluster lock.
//!
//! Everything between `lock()` and `unlock()` works on a snapshot of the
//! registry. Ledgers are mutated as working copies and written back in one
//! transaction, so a failure at any step leaves the registry as it was.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use podgrid_lock::{DistributedMutex, LockBackend};
use podgrid_placement::CpuMemScheduler;
use podgrid_resources::{
    DispenseOptions, Node, NodeInfo, ResourceMeta, ResourceOptions, ResourceRequest,
    SchedulePlan, Scheduler, make_request,
};
use podgrid_state::StateStore;

use crate::config::{LockConfig, PodgridConfig};
use crate::error::{SchedulerError, SchedulerResult};

/// One reserved instance slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub node: String,
    /// Slot index within the node's share of the plan.
    pub index: usize,
    pub resource: ResourceMeta,
}

/// Serializes resource reservations over a shared node registry.
pub struct Coordinator {
    store: StateStore,
    strategy: Arc<dyn Scheduler>,
    mutex: DistributedMutex,
}

impl Coordinator {
    pub fn new(
        store: StateStore,
        strategy: Arc<dyn Scheduler>,
        lock_backend: Arc<dyn LockBackend>,
        lock: &LockConfig,
    ) -> SchedulerResult<Self> {
        let mutex = DistributedMutex::new(lock_backend, &lock.key, lock.ttl())?;
        Ok(Self {
            store,
            strategy,
            mutex,
        })
    }

    /// Build a coordinator with the [`CpuMemScheduler`] strategy from config.
    pub fn from_config(
        config: &PodgridConfig,
        store: StateStore,
        lock_backend: Arc<dyn LockBackend>,
    ) -> SchedulerResult<Self> {
        let strategy = Arc::new(CpuMemScheduler::new(config.placement.clone()));
        Self::new(store, strategy, lock_backend, &config.lock)
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Reserve `count` instances shaped by `options`.
    ///
    /// Invalid requests are rejected before the lock is taken. The registry
    /// work runs on the blocking pool. The lock is released on every path;
    /// if this future is dropped mid-flight the guard releases it in the
    /// background once that work has finished.
    pub async fn schedule(
        &self,
        options: ResourceOptions,
        count: usize,
    ) -> SchedulerResult<Vec<Allocation>> {
        if count == 0 {
            return Err(SchedulerError::InvalidCount);
        }
        let request = make_request(options)?;

        let guard = self.mutex.lock().await?;
        let store = self.store.clone();
        let strategy = Arc::clone(&self.strategy);
        // The guard travels with the work so the key stays held until the
        // write has landed, even when this future is dropped.
        let (guard, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = reserve(&store, &*strategy, &request, count);
            (guard, outcome)
        })
        .await
        .map_err(|e| SchedulerError::Task(e.to_string()))?;
        if let Err(e) = guard.unlock().await {
            warn!(key = self.mutex.key(), error = %e, "failed to release scheduling lock");
        }

        let allocations = outcome?;
        let nodes: BTreeSet<&str> = allocations.iter().map(|a| a.node.as_str()).collect();
        info!(count, nodes = nodes.len(), bind = request.cpu_bind(), "instances scheduled");
        Ok(allocations)
    }
}

/// The critical section: snapshot, select, apply, dispense, persist.
fn reserve(
    store: &StateStore,
    strategy: &dyn Scheduler,
    request: &ResourceRequest,
    count: usize,
) -> SchedulerResult<Vec<Allocation>> {
    let nodes = store.list_nodes()?;
    let infos: Vec<NodeInfo> = nodes.iter().map(NodeInfo::from).collect();

    let select = request.make_scheduler(strategy);
    let (plan, selected) = select(infos)?;
    let available = plan.total();
    debug!(selected, available, count, "plan built");
    if available < count {
        return Err(SchedulerError::InsufficientCapacity {
            requested: count,
            available,
        });
    }

    let mut ledgers: HashMap<String, Node> = nodes
        .into_iter()
        .map(|node| (node.name().to_string(), node))
        .collect();
    let mut touched = Vec::new();
    let mut remaining = count;
    for (name, capacity) in plan.nodes() {
        if remaining == 0 {
            break;
        }
        let take = capacity.min(remaining);
        let node = ledgers
            .remove(name)
            .ok_or_else(|| SchedulerError::UnknownNode(name.to_string()))?;
        touched.push((node, (0..take).collect::<Vec<_>>()));
        remaining -= take;
    }

    apply_all(&plan, &mut touched)?;

    let mut allocations = Vec::with_capacity(count);
    for (node, indices) in &touched {
        for &index in indices {
            let opts = DispenseOptions { node, index };
            let resource = plan.dispense(&opts, ResourceMeta::default())?;
            allocations.push(Allocation {
                node: node.name().to_string(),
                index,
                resource,
            });
        }
    }

    let updated: Vec<Node> = touched.into_iter().map(|(node, _)| node).collect();
    store.put_nodes(&updated)?;
    Ok(allocations)
}

/// Apply every node's slots, undoing earlier nodes if a later one fails.
fn apply_all(plan: &SchedulePlan, touched: &mut [(Node, Vec<usize>)]) -> SchedulerResult<()> {
    for i in 0..touched.len() {
        let (node, indices) = &mut touched[i];
        if let Err(e) = plan.apply_changes_on_node(node, indices) {
            warn!(node = node.name(), error = %e, "apply failed, rolling back");
            for (done, indices) in touched[..i].iter_mut().rev() {
                if let Err(rollback) = plan.rollback_changes_on_node(done, indices) {
                    warn!(node = done.name(), error = %rollback, "rollback failed");
                }
            }
            return Err(e.into());
        }
    }
    Ok(())
}

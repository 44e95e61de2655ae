//! Placement engine — the production [`Scheduler`].
//!
//! Given node snapshots and a validated request, the placer:
//! 1. Computes each node's deployable count (share mode) or core
//!    combinations (bind mode)
//! 2. Drops nodes that cannot host a single instance
//! 3. Ranks the rest (see [`crate::scorer`])

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use podgrid_resources::{
    CpuPlans, CpuSelection, MemorySelection, NodeInfo, ResourceRequest, ResourceResult, Scheduler,
};

use crate::capacity::share_capacity;
use crate::cores::core_plans;
use crate::scorer::{RankingPolicy, rank_nodes};

/// Default cap on instances per node per request.
const DEFAULT_MAX_INSTANCES_PER_NODE: usize = 256;

/// Tunables for [`CpuMemScheduler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Upper bound on deployable count per node.
    pub max_instances_per_node: usize,
    /// Node ordering within a plan.
    pub policy: RankingPolicy,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            max_instances_per_node: DEFAULT_MAX_INSTANCES_PER_NODE,
            policy: RankingPolicy::default(),
        }
    }
}

/// CPU/memory selection strategy.
#[derive(Debug, Clone, Default)]
pub struct CpuMemScheduler {
    config: PlacementConfig,
}

impl CpuMemScheduler {
    pub fn new(config: PlacementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }
}

impl Scheduler for CpuMemScheduler {
    fn select_cpu_nodes(
        &self,
        request: &ResourceRequest,
        nodes: Vec<NodeInfo>,
    ) -> ResourceResult<CpuSelection> {
        let quota = request.quota_units();
        let memory = request.memory_request();
        let candidates = nodes.len();

        let mut selected: Vec<NodeInfo> = nodes
            .into_iter()
            .filter_map(|mut info| {
                let plans = core_plans(&info, quota, memory, self.config.max_instances_per_node);
                if plans.is_empty() {
                    debug!(node = %info.name, quota, memory, "no core combination fits");
                    return None;
                }
                info.capacity = plans.len();
                info.cpu_plan = plans;
                Some(info)
            })
            .collect();

        rank_nodes(&mut selected, self.config.policy);

        let plans: CpuPlans = selected
            .iter()
            .map(|info| (info.name.clone(), info.cpu_plan.clone()))
            .collect();
        let total = selected.iter().map(|info| info.capacity).sum();

        info!(candidates, selected = selected.len(), total, quota, "selected cpu nodes");
        Ok(CpuSelection {
            nodes: selected,
            plans,
            total,
        })
    }

    fn select_memory_nodes(
        &self,
        request: &ResourceRequest,
        nodes: Vec<NodeInfo>,
    ) -> ResourceResult<MemorySelection> {
        let quota = request.quota_units();
        let memory = request.memory_request();
        let candidates = nodes.len();

        let mut selected: Vec<NodeInfo> = nodes
            .into_iter()
            .filter_map(|mut info| {
                let capacity =
                    share_capacity(&info, memory, quota, self.config.max_instances_per_node);
                if capacity == 0 {
                    debug!(node = %info.name, quota, memory, "node has no room");
                    return None;
                }
                info.capacity = capacity;
                Some(info)
            })
            .collect();

        rank_nodes(&mut selected, self.config.policy);
        let total = selected.iter().map(|info| info.capacity).sum();

        info!(candidates, selected = selected.len(), total, memory, "selected memory nodes");
        Ok(MemorySelection {
            nodes: selected,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgrid_resources::{Node, QUOTA_BASE, ResourceOptions, make_request};

    fn node(name: &str, cores: usize, memory: i64) -> Node {
        (0..cores)
            .fold(Node::new(name), |n, c| {
                n.with_core(c.to_string(), QUOTA_BASE).with_numa(c.to_string(), "0")
            })
            .with_numa_memory("0", memory)
            .with_memory(memory)
    }

    fn request(cpu: f64, bind: bool, memory: i64) -> ResourceRequest {
        make_request(ResourceOptions {
            cpu_quota_request: cpu,
            cpu_quota_limit: cpu,
            cpu_bind: bind,
            memory_request: memory,
            memory_limit: memory,
        })
        .unwrap()
    }

    fn infos(nodes: &[Node]) -> Vec<NodeInfo> {
        nodes.iter().map(NodeInfo::from).collect()
    }

    #[test]
    fn memory_selection_drops_full_nodes_and_ranks() {
        let nodes = [node("big", 4, 4096), node("small", 4, 1024), node("full", 4, 100)];
        let scheduler = CpuMemScheduler::default();

        let selection = scheduler
            .select_memory_nodes(&request(0.0, false, 512), infos(&nodes))
            .unwrap();

        let order: Vec<_> = selection.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(order, vec!["small", "big"]);
        assert_eq!(selection.nodes[0].capacity, 2);
        assert_eq!(selection.nodes[1].capacity, 8);
        assert_eq!(selection.total, 10);
    }

    #[test]
    fn cpu_selection_annotates_plans() {
        let nodes = [node("n1", 2, 4096), node("n2", 1, 4096)];
        let scheduler = CpuMemScheduler::new(PlacementConfig {
            policy: RankingPolicy::Spread,
            ..Default::default()
        });

        let selection = scheduler
            .select_cpu_nodes(&request(1.0, true, 0), infos(&nodes))
            .unwrap();

        assert_eq!(selection.total, 3);
        assert_eq!(selection.nodes[0].name, "n1");
        assert_eq!(selection.plans["n1"].len(), 2);
        assert_eq!(selection.plans["n2"].len(), 1);
        assert_eq!(selection.nodes[0].cpu_plan, selection.plans["n1"]);
    }

    #[test]
    fn cpu_selection_with_no_room_is_empty() {
        let nodes = [node("n1", 1, 4096)];
        let scheduler = CpuMemScheduler::default();

        let selection = scheduler
            .select_cpu_nodes(&request(2.0, true, 0), infos(&nodes))
            .unwrap();

        assert!(selection.nodes.is_empty());
        assert!(selection.plans.is_empty());
        assert_eq!(selection.total, 0);
    }

    #[test]
    fn plugs_into_request_adapter() {
        let nodes = [node("n1", 2, 4096)];
        let scheduler = CpuMemScheduler::default();
        let req = request(0.5, true, 1024);

        let (plan, total) = req.make_scheduler(&scheduler)(infos(&nodes)).unwrap();

        // Memory allows four instances; cores allow four halves.
        assert_eq!(total, 4);
        assert_eq!(plan.capacity("n1"), Some(4));
    }
}

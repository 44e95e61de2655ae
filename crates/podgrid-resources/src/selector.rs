//! Node-selection adapter.
//!
//! The selection heuristic itself is pluggable: anything implementing
//! [`Scheduler`] can be handed to [`ResourceRequest::make_scheduler`]. The
//! adapter only decides which of the two entry points to call and wraps
//! the answer into a [`SchedulePlan`].

use tracing::debug;

use crate::error::{ResourceError, ResourceResult};
use crate::plan::SchedulePlan;
use crate::request::ResourceRequest;
use crate::types::{CpuPlans, NodeInfo, ResourceType};

/// Result of a CPU-bind selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuSelection {
    /// Qualifying nodes, annotated.
    pub nodes: Vec<NodeInfo>,
    /// Core combinations per node name.
    pub plans: CpuPlans,
    /// Total deployable count across `nodes`.
    pub total: usize,
}

/// Result of a memory/share selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySelection {
    /// Qualifying nodes with `capacity` set.
    pub nodes: Vec<NodeInfo>,
    /// Total deployable count across `nodes`.
    pub total: usize,
}

/// Pluggable node-selection strategy.
pub trait Scheduler: Send + Sync {
    /// Pick nodes able to host pinned cores, with concrete core combinations.
    fn select_cpu_nodes(
        &self,
        request: &ResourceRequest,
        nodes: Vec<NodeInfo>,
    ) -> ResourceResult<CpuSelection>;

    /// Pick nodes by memory and unpinned quota, annotating deployable counts.
    fn select_memory_nodes(
        &self,
        request: &ResourceRequest,
        nodes: Vec<NodeInfo>,
    ) -> ResourceResult<MemorySelection>;
}

impl ResourceRequest {
    /// Build the selector for this request over the given strategy.
    ///
    /// The returned closure yields the plan and the strategy's reported
    /// total capacity. Strategy errors are returned as-is.
    pub fn make_scheduler<'a>(
        &'a self,
        scheduler: &'a dyn Scheduler,
    ) -> impl Fn(Vec<NodeInfo>) -> ResourceResult<(SchedulePlan, usize)> + 'a {
        move |nodes| self.select(scheduler, nodes)
    }

    fn select(
        &self,
        scheduler: &dyn Scheduler,
        nodes: Vec<NodeInfo>,
    ) -> ResourceResult<(SchedulePlan, usize)> {
        let candidates = nodes.len();

        let (plan, total) = if self.resource_type().contains(ResourceType::CPU_BIND) {
            let selection = scheduler.select_cpu_nodes(self, nodes)?;
            if selection.nodes.is_empty() {
                return Err(ResourceError::NoAvailableNode);
            }
            let plan = SchedulePlan::bind(*self, &selection.nodes, selection.plans);
            (plan, selection.total)
        } else {
            let selection = scheduler.select_memory_nodes(self, nodes)?;
            if selection.nodes.is_empty() {
                return Err(ResourceError::NoAvailableNode);
            }
            (SchedulePlan::share(*self, &selection.nodes), selection.total)
        };

        if plan.is_empty() {
            return Err(ResourceError::NoAvailableNode);
        }

        debug!(
            candidates,
            selected = plan.nodes().count(),
            total,
            bind = plan.is_bind(),
            "built schedule plan"
        );
        Ok((plan, total))
    }
}

//! Schedule plan — the allocation transaction.
//!
//! A [`SchedulePlan`] records, for every qualifying node, how many instances
//! of the requested shape it can host and (in bind mode) which cores each
//! slot would take. Per (node, slot) the lifecycle is:
//!
//! ```text
//! Unapplied ──apply──► Applied ──dispense──► Dispensed
//!                         └─────rollback───► RolledBack
//! ```
//!
//! The plan does not track which slots were applied. Calling apply twice
//! for the same slot deducts twice; callers drive each step exactly once.

use tracing::debug;

use crate::error::{ResourceError, ResourceResult};
use crate::request::ResourceRequest;
use crate::types::{CpuMap, CpuPlans, DispenseOptions, Node, NodeInfo, ResourceMeta};

/// How a plan's slots consume CPU.
#[derive(Debug, Clone, PartialEq)]
pub enum Allocation {
    /// Each slot pins a concrete core combination.
    Bind(CpuPlans),
    /// Slots draw from the node's shared quota pool and memory.
    Share,
}

/// A qualifying node and its deployable count.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedNode {
    name: String,
    capacity: usize,
}

/// Allocation plan produced by a single selection call.
#[derive(Debug, Clone)]
pub struct SchedulePlan {
    request: ResourceRequest,
    allocation: Allocation,
    /// Qualifying nodes in selection order.
    nodes: Vec<PlannedNode>,
}

impl SchedulePlan {
    /// Bind-mode plan: a node's capacity is its number of core combinations.
    pub(crate) fn bind(request: ResourceRequest, infos: &[NodeInfo], plans: CpuPlans) -> Self {
        let nodes = infos
            .iter()
            .filter_map(|info| {
                let capacity = plans.get(&info.name).map_or(0, Vec::len);
                (capacity > 0).then(|| PlannedNode {
                    name: info.name.clone(),
                    capacity,
                })
            })
            .collect();

        Self {
            request,
            allocation: Allocation::Bind(plans),
            nodes,
        }
    }

    /// Share-mode plan: capacities come from the strategy's annotations.
    pub(crate) fn share(request: ResourceRequest, infos: &[NodeInfo]) -> Self {
        let nodes = infos
            .iter()
            .filter(|info| info.capacity > 0)
            .map(|info| PlannedNode {
                name: info.name.clone(),
                capacity: info.capacity,
            })
            .collect();

        Self {
            request,
            allocation: Allocation::Share,
            nodes,
        }
    }

    pub fn request(&self) -> &ResourceRequest {
        &self.request
    }

    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    pub fn is_bind(&self) -> bool {
        matches!(self.allocation, Allocation::Bind(_))
    }

    /// True if no node can host an instance.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `(node name, deployable count)` in selection order.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, usize)> {
        self.nodes.iter().map(|n| (n.name.as_str(), n.capacity))
    }

    /// Deployable count for a node, `None` if the node is not in the plan.
    pub fn capacity(&self, node: &str) -> Option<usize> {
        self.nodes.iter().find(|n| n.name == node).map(|n| n.capacity)
    }

    /// Sum of deployable counts over all nodes.
    pub fn total(&self) -> usize {
        self.nodes.iter().map(|n| n.capacity).sum()
    }

    /// Core combinations recorded for a node (bind mode only).
    pub fn cpu_plans(&self, node: &str) -> Option<&[CpuMap]> {
        match &self.allocation {
            Allocation::Bind(plans) => plans.get(node).map(Vec::as_slice),
            Allocation::Share => None,
        }
    }

    /// Reserve the given slots on `node`.
    ///
    /// All slots are validated before any counter moves, so an error leaves
    /// the node untouched.
    pub fn apply_changes_on_node(&self, node: &mut Node, indices: &[usize]) -> ResourceResult<()> {
        let slots = self.checked_slots(node, indices)?;
        let memory = self.request.memory_request();

        match slots {
            Some(cpus) => {
                for cpu in cpus {
                    node.sub_cpu(cpu);
                    if memory > 0 {
                        if let Some(numa) = node.numa_node_of(cpu).map(str::to_owned) {
                            node.adjust_numa_memory(&numa, -memory);
                        }
                    }
                    node.adjust_memory(-memory);
                }
            }
            None => {
                let count = indices.len() as i64;
                node.adjust_memory(-memory * count);
                node.adjust_cpu_used(self.request.quota_units() * count);
            }
        }

        debug!(
            node = node.name(),
            slots = indices.len(),
            bind = self.is_bind(),
            mem_cap = node.mem_cap(),
            "applied plan on node"
        );
        Ok(())
    }

    /// Release the given slots on `node`, the exact inverse of
    /// [`apply_changes_on_node`](Self::apply_changes_on_node).
    pub fn rollback_changes_on_node(
        &self,
        node: &mut Node,
        indices: &[usize],
    ) -> ResourceResult<()> {
        let slots = self.checked_slots(node, indices)?;
        let memory = self.request.memory_request();

        match slots {
            Some(cpus) => {
                for cpu in cpus {
                    node.add_cpu(cpu);
                    if memory > 0 {
                        if let Some(numa) = node.numa_node_of(cpu).map(str::to_owned) {
                            node.adjust_numa_memory(&numa, memory);
                        }
                    }
                    node.adjust_memory(memory);
                }
            }
            None => {
                let count = indices.len() as i64;
                node.adjust_memory(memory * count);
                node.adjust_cpu_used(-self.request.quota_units() * count);
            }
        }

        debug!(
            node = node.name(),
            slots = indices.len(),
            bind = self.is_bind(),
            mem_cap = node.mem_cap(),
            "rolled back plan on node"
        );
        Ok(())
    }

    /// Materialize an applied slot into a workload's resource descriptor.
    ///
    /// Does not touch node counters; the slot must already be applied.
    pub fn dispense(
        &self,
        opts: &DispenseOptions<'_>,
        mut meta: ResourceMeta,
    ) -> ResourceResult<ResourceMeta> {
        let name = opts.node.name();
        let capacity = self
            .capacity(name)
            .ok_or_else(|| ResourceError::NodeNotInPlan(name.to_string()))?;
        if opts.index >= capacity {
            return Err(out_of_range(name, opts.index, capacity));
        }

        meta.cpu_quota_request = self.request.cpu_quota_request();
        meta.cpu_quota_limit = self.request.cpu_quota_limit();
        meta.cpu_bind = self.request.cpu_bind();
        meta.memory_request = self.request.memory_request();
        meta.memory_limit = self.request.memory_limit();
        meta.cpu = CpuMap::new();
        meta.numa_node = None;

        if let Allocation::Bind(plans) = &self.allocation {
            let cpu = plans
                .get(name)
                .and_then(|cpus| cpus.get(opts.index))
                .ok_or_else(|| out_of_range(name, opts.index, capacity))?;
            meta.numa_node = opts.node.numa_node_of(cpu).map(str::to_owned);
            meta.cpu = cpu.clone();
        }

        debug!(node = name, index = opts.index, cores = meta.cpu.len(), "dispensed slot");
        Ok(meta)
    }

    /// Validate `indices` against the plan and the node.
    ///
    /// Returns the chosen core maps in bind mode, `None` in share mode.
    fn checked_slots<'a>(
        &'a self,
        node: &Node,
        indices: &[usize],
    ) -> ResourceResult<Option<Vec<&'a CpuMap>>> {
        let name = node.name();
        let capacity = self
            .capacity(name)
            .ok_or_else(|| ResourceError::NodeNotInPlan(name.to_string()))?;
        if let Some(&index) = indices.iter().find(|&&i| i >= capacity) {
            return Err(out_of_range(name, index, capacity));
        }

        let Allocation::Bind(plans) = &self.allocation else {
            return Ok(None);
        };

        let candidates = plans
            .get(name)
            .ok_or_else(|| ResourceError::NodeNotInPlan(name.to_string()))?;
        let mut cpus = Vec::with_capacity(indices.len());
        for &index in indices {
            let cpu = candidates
                .get(index)
                .ok_or_else(|| out_of_range(name, index, capacity))?;
            if let Some(core) = cpu.keys().find(|core| !node.cpu().contains_key(*core)) {
                return Err(ResourceError::UnknownCore {
                    node: name.to_string(),
                    core: core.clone(),
                });
            }
            cpus.push(cpu);
        }
        Ok(Some(cpus))
    }
}

fn out_of_range(node: &str, index: usize, capacity: usize) -> ResourceError {
    ResourceError::IndexOutOfRange {
        node: node.to_string(),
        index,
        capacity,
    }
}

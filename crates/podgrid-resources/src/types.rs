//! Domain types for the resource core.
//!
//! `Node` is the authoritative, mutable ledger for one cluster node.
//! `NodeInfo` is the read-only snapshot handed to selection strategies.
//! CPU amounts are integer quota units where [`QUOTA_BASE`] is one core.

use std::collections::BTreeMap;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Quota units that make up one full core.
pub const QUOTA_BASE: i64 = 10_000;

/// Core id → quota units.
pub type CpuMap = BTreeMap<String, i64>;

/// Node name → candidate core combinations, one per deployable slot.
pub type CpuPlans = BTreeMap<String, Vec<CpuMap>>;

/// Core id → NUMA node id.
pub type NumaMap = BTreeMap<String, String>;

/// NUMA node id → memory remaining (bytes).
pub type NumaMemory = BTreeMap<String, i64>;

// ── Input ─────────────────────────────────────────────────────────

/// Raw user-supplied resource options, before validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceOptions {
    /// CPU quota requested, in cores (fractional).
    #[serde(default)]
    pub cpu_quota_request: f64,
    /// CPU quota limit, in cores (fractional).
    #[serde(default)]
    pub cpu_quota_limit: f64,
    /// Pin the workload to concrete cores instead of sharing.
    #[serde(default)]
    pub cpu_bind: bool,
    /// Memory requested, in bytes.
    #[serde(default)]
    pub memory_request: i64,
    /// Memory limit, in bytes.
    #[serde(default)]
    pub memory_limit: i64,
}

// ── Resource type flags ───────────────────────────────────────────

/// Set of resource dimensions a request touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ResourceType(u8);

impl ResourceType {
    pub const CPU: Self = Self(1);
    pub const MEMORY: Self = Self(1 << 1);
    pub const CPU_BIND: Self = Self(1 << 2);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every flag in `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any flag in `other` is set in `self`.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for ResourceType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ResourceType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ResourceType {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

// ── Node ledger ───────────────────────────────────────────────────

/// Live resource ledger for one cluster node.
///
/// Counters are only readable from outside this crate. They move through
/// [`crate::SchedulePlan::apply_changes_on_node`] and
/// [`crate::SchedulePlan::rollback_changes_on_node`], which keeps every
/// apply exactly reversible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    name: String,
    /// Remaining quota per core.
    cpu: CpuMap,
    #[serde(default)]
    numa: NumaMap,
    #[serde(default)]
    numa_memory: NumaMemory,
    /// Remaining memory across the node (bytes).
    mem_cap: i64,
    /// Quota units reserved by unpinned (share-mode) workloads.
    #[serde(default)]
    cpu_used: i64,
}

impl Node {
    /// Create an empty ledger for the named node.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cpu: CpuMap::new(),
            numa: NumaMap::new(),
            numa_memory: NumaMemory::new(),
            mem_cap: 0,
            cpu_used: 0,
        }
    }

    /// Add a core with the given available quota.
    pub fn with_core(mut self, core: impl Into<String>, quota: i64) -> Self {
        self.cpu.insert(core.into(), quota);
        self
    }

    /// Place a core in a NUMA domain.
    pub fn with_numa(mut self, core: impl Into<String>, numa_node: impl Into<String>) -> Self {
        self.numa.insert(core.into(), numa_node.into());
        self
    }

    /// Set the memory remaining in a NUMA domain.
    pub fn with_numa_memory(mut self, numa_node: impl Into<String>, memory: i64) -> Self {
        self.numa_memory.insert(numa_node.into(), memory);
        self
    }

    /// Set the node's total remaining memory.
    pub fn with_memory(mut self, memory: i64) -> Self {
        self.mem_cap = memory;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cpu(&self) -> &CpuMap {
        &self.cpu
    }

    pub fn numa(&self) -> &NumaMap {
        &self.numa
    }

    pub fn numa_memory(&self) -> &NumaMemory {
        &self.numa_memory
    }

    pub fn mem_cap(&self) -> i64 {
        self.mem_cap
    }

    pub fn cpu_used(&self) -> i64 {
        self.cpu_used
    }

    /// The NUMA domain hosting every core in `cpu`, if there is exactly one.
    pub fn numa_node_of(&self, cpu: &CpuMap) -> Option<&str> {
        numa_node_of(&self.numa, cpu)
    }

    pub(crate) fn sub_cpu(&mut self, cpu: &CpuMap) {
        for (core, quota) in cpu {
            if let Some(remaining) = self.cpu.get_mut(core) {
                *remaining -= quota;
            }
        }
    }

    pub(crate) fn add_cpu(&mut self, cpu: &CpuMap) {
        for (core, quota) in cpu {
            if let Some(remaining) = self.cpu.get_mut(core) {
                *remaining += quota;
            }
        }
    }

    pub(crate) fn adjust_memory(&mut self, delta: i64) {
        self.mem_cap += delta;
    }

    /// Unknown domains are left alone so that apply/rollback stay symmetric.
    pub(crate) fn adjust_numa_memory(&mut self, numa_node: &str, delta: i64) {
        if let Some(memory) = self.numa_memory.get_mut(numa_node) {
            *memory += delta;
        }
    }

    pub(crate) fn adjust_cpu_used(&mut self, delta: i64) {
        self.cpu_used += delta;
    }
}

/// Snapshot of a node as seen by a selection strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    /// Available quota per core.
    pub cpu_map: CpuMap,
    pub numa: NumaMap,
    pub numa_memory: NumaMemory,
    /// Total memory remaining (bytes).
    pub mem_cap: i64,
    /// Quota units already reserved by share-mode workloads.
    pub cpu_used: i64,
    /// Core combinations judged usable for the current request.
    pub cpu_plan: Vec<CpuMap>,
    /// Deployable count annotated by the selection strategy.
    pub capacity: usize,
}

impl NodeInfo {
    /// The NUMA domain hosting every core in `cpu`, if there is exactly one.
    pub fn numa_node_of(&self, cpu: &CpuMap) -> Option<&str> {
        numa_node_of(&self.numa, cpu)
    }

    /// Quota available to unpinned workloads.
    pub fn share_quota(&self) -> i64 {
        self.cpu_map.values().sum::<i64>() - self.cpu_used
    }
}

impl From<&Node> for NodeInfo {
    fn from(node: &Node) -> Self {
        NodeInfo {
            name: node.name.clone(),
            cpu_map: node.cpu.clone(),
            numa: node.numa.clone(),
            numa_memory: node.numa_memory.clone(),
            mem_cap: node.mem_cap,
            cpu_used: node.cpu_used,
            cpu_plan: Vec::new(),
            capacity: 0,
        }
    }
}

fn numa_node_of<'a>(numa: &'a NumaMap, cpu: &CpuMap) -> Option<&'a str> {
    let mut found: Option<&'a str> = None;
    for core in cpu.keys() {
        let domain = numa.get(core)?.as_str();
        match found {
            None => found = Some(domain),
            Some(prev) if prev == domain => {}
            Some(_) => return None,
        }
    }
    found
}

// ── Output ────────────────────────────────────────────────────────

/// Selects which planned slot to materialize.
#[derive(Debug, Clone, Copy)]
pub struct DispenseOptions<'a> {
    pub node: &'a Node,
    pub index: usize,
}

/// Resources bound to one workload instance once dispensed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMeta {
    pub cpu_quota_request: f64,
    pub cpu_quota_limit: f64,
    pub cpu_bind: bool,
    /// Pinned cores and their quota; empty when unbound.
    pub cpu: CpuMap,
    /// NUMA domain of the pinned cores, when they share one.
    pub numa_node: Option<String>,
    pub memory_request: i64,
    pub memory_limit: i64,
}

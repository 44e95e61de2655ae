//! podgrid-resources — the resource-allocation core.
//!
//! Turns a declarative resource request (CPU quota, memory, optional core
//! pinning) into a [`SchedulePlan`] that can be applied to, rolled back
//! from, and dispensed out of live [`Node`] ledgers.
//!
//! # Flow
//!
//! ```text
//! ResourceOptions
//!   └── make_request() ──► ResourceRequest
//!         └── make_scheduler(&dyn Scheduler) ──► selector(Vec<NodeInfo>)
//!               ├── CPU-bind  → Scheduler::select_cpu_nodes
//!               └── otherwise → Scheduler::select_memory_nodes
//!                     └──► SchedulePlan
//!                           ├── apply_changes_on_node(&mut Node, ..)
//!                           ├── rollback_changes_on_node(&mut Node, ..)
//!                           └── dispense(..) ──► ResourceMeta
//! ```
//!
//! Everything here is synchronous and only touches the `Node` it is handed.
//! Serializing concurrent plans over the same nodes is the caller's job
//! (see `podgrid-lock` and `podgrid-scheduler`).

pub mod error;
pub mod plan;
pub mod request;
pub mod selector;
pub mod types;

pub use error::{ResourceError, ResourceResult};
pub use plan::{Allocation, SchedulePlan};
pub use request::{ResourceRequest, make_request};
pub use selector::{CpuSelection, MemorySelection, Scheduler};
pub use types::*;

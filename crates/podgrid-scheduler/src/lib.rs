//! podgrid-scheduler — the scheduling critical section.
//!
//! A [`Coordinator`] turns "N instances of this shape" into concrete
//! per-node slots, holding the cluster-wide scheduling lock while it reads,
//! reserves, and persists node ledgers.
//!
//! ```text
//! schedule(options, count)
//!   ├── make_request()            (no lock held yet)
//!   ├── DistributedMutex::lock()
//!   ├── StateStore::list_nodes()  → snapshot
//!   ├── selector(snapshot)        → SchedulePlan
//!   ├── apply_changes_on_node()   (working copies, rollback on failure)
//!   ├── dispense()                → ResourceMeta per slot
//!   ├── StateStore::put_nodes()   (one transaction)
//!   └── LockGuard::unlock()
//! ```

pub mod config;
pub mod coordinator;
pub mod error;

pub use config::{LockConfig, PodgridConfig, StateConfig};
pub use coordinator::{Allocation, Coordinator};
pub use error::{SchedulerError, SchedulerResult};

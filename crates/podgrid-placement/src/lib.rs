//! podgrid placement — the production node-selection strategy.
//!
//! Implements [`podgrid_resources::Scheduler`] with:
//!
//! - **`capacity`** — deployable counts for unpinned (share-mode) requests
//! - **`cores`** — NUMA-aware search for pinned core combinations
//! - **`scorer`** — ranking of qualifying nodes (pack or spread)
//! - **`placer`** — [`CpuMemScheduler`], tying the three together

pub mod capacity;
pub mod cores;
pub mod placer;
pub mod scorer;

pub use placer::{CpuMemScheduler, PlacementConfig};
pub use scorer::{NodeScore, RankingPolicy, rank_nodes};

//! podgrid-lock — lease-bound distributed mutex.
//!
//! Serializes scheduling decisions across scheduler instances sharing the
//! same cluster state. A lock is held through a lease: if its holder dies,
//! the lease stops being renewed and the lock frees itself.
//!
//! # Architecture
//!
//! ```text
//! DistributedMutex (key, ttl)
//!   └── lock() ──► LockGuard
//!         ├── Session (lease + keep-alive task)
//!         └── unlock() → release key, revoke lease
//!
//! LockBackend (trait)
//!   └── MemoryBackend (in-process lease table)
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod mutex;

pub use backend::{BoxFuture, LeaseId, LockBackend};
pub use error::{LockError, LockResult};
pub use memory::MemoryBackend;
pub use mutex::{DistributedMutex, LockGuard};

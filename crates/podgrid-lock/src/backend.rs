//! Coordination backend seam.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::LockResult;

/// Boxed future alias for backend operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Identifier of a granted lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeaseId(pub u64);

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Lease-based coordination service a [`crate::DistributedMutex`] runs on.
///
/// A key held under a lease is freed when the lease is revoked or expires.
pub trait LockBackend: Send + Sync {
    /// Grant a lease that expires after `ttl` unless kept alive.
    fn grant_lease(&self, ttl: Duration) -> BoxFuture<'_, LockResult<LeaseId>>;

    /// Renew a lease for another full ttl.
    fn keep_alive(&self, lease: LeaseId) -> BoxFuture<'_, LockResult<()>>;

    /// Revoke a lease, freeing every key held under it.
    fn revoke_lease(&self, lease: LeaseId) -> BoxFuture<'_, LockResult<()>>;

    /// Wait until `key` is held under `lease`. Not bounded; callers add timeouts.
    fn acquire<'a>(&'a self, key: &'a str, lease: LeaseId) -> BoxFuture<'a, LockResult<()>>;

    /// Free `key` if it is held under `lease`.
    fn release<'a>(&'a self, key: &'a str, lease: LeaseId) -> BoxFuture<'a, LockResult<()>>;
}

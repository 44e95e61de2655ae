//! Distributed mutex over a [`LockBackend`].
//!
//! Every [`DistributedMutex::lock`] opens its own session: a lease with the
//! mutex's ttl, renewed in the background until the guard is released. The
//! ttl also bounds how long `lock` waits, and how long each step of
//! `unlock` may take, so a slow backend cannot stall the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::backend::{LeaseId, LockBackend};
use crate::error::{LockError, LockResult};

/// A lease plus the task keeping it alive.
///
/// A session dropped before [`Session::close`] finishes (a cancelled
/// `lock()` or `unlock()`) stops renewing and revokes its lease in the
/// background.
struct Session {
    backend: Arc<dyn LockBackend>,
    lease: LeaseId,
    keep_alive: JoinHandle<()>,
    closed: bool,
}

impl Session {
    async fn open(backend: Arc<dyn LockBackend>, ttl: Duration) -> LockResult<Self> {
        let lease = backend.grant_lease(ttl).await?;
        let interval = (ttl / 3).max(Duration::from_millis(1));
        let renewer = backend.clone();
        let keep_alive = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = renewer.keep_alive(lease).await {
                    warn!(%lease, error = %e, "lease keep-alive failed");
                    break;
                }
            }
        });
        Ok(Self {
            backend,
            lease,
            keep_alive,
            closed: false,
        })
    }

    /// Stop renewing and revoke the lease.
    async fn close(mut self, ttl: Duration) -> LockResult<()> {
        self.keep_alive.abort();
        let result = match timeout(ttl, self.backend.revoke_lease(self.lease)).await {
            Ok(result) => result,
            Err(_) => Err(LockError::Timeout {
                key: format!("lease/{}", self.lease),
                after: ttl,
            }),
        };
        self.closed = true;
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.keep_alive.abort();
        if self.closed {
            return;
        }
        let lease = self.lease;
        match Handle::try_current() {
            Ok(handle) => {
                let backend = self.backend.clone();
                handle.spawn(async move {
                    if let Err(e) = backend.revoke_lease(lease).await {
                        debug!(%lease, error = %e, "background lease revoke failed");
                    }
                });
            }
            Err(_) => warn!(%lease, "no runtime to revoke lease, left to expire"),
        }
    }
}

/// Named lock with a bounded lease.
#[derive(Clone)]
pub struct DistributedMutex {
    backend: Arc<dyn LockBackend>,
    key: String,
    ttl: Duration,
}

impl std::fmt::Debug for DistributedMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedMutex")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl DistributedMutex {
    /// Create a mutex on `key`. A missing leading `/` is added.
    pub fn new(backend: Arc<dyn LockBackend>, key: &str, ttl: Duration) -> LockResult<Self> {
        if key.is_empty() {
            return Err(LockError::KeyIsEmpty);
        }
        if ttl.is_zero() {
            return Err(LockError::InvalidTtl);
        }
        let key = if key.starts_with('/') {
            key.to_string()
        } else {
            format!("/{key}")
        };
        Ok(Self { backend, key, ttl })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Acquire the lock, waiting at most one ttl.
    pub async fn lock(&self) -> LockResult<LockGuard> {
        let session = Session::open(self.backend.clone(), self.ttl).await?;
        let lease = session.lease;

        let outcome = match timeout(self.ttl, self.backend.acquire(&self.key, lease)).await {
            Ok(result) => result,
            Err(_) => Err(LockError::Timeout {
                key: self.key.clone(),
                after: self.ttl,
            }),
        };

        if let Err(e) = outcome {
            if let Err(close_err) = session.close(self.ttl).await {
                debug!(
                    key = %self.key,
                    error = %close_err,
                    "failed to close session after lock error"
                );
            }
            return Err(e);
        }

        debug!(key = %self.key, %lease, "lock held");
        Ok(LockGuard {
            key: self.key.clone(),
            ttl: self.ttl,
            session: Some(session),
        })
    }
}

/// A held lock. Release with [`LockGuard::unlock`].
///
/// Dropping a guard without unlocking schedules the release on the current
/// tokio runtime; outside a runtime the lease is left to expire.
pub struct LockGuard {
    key: String,
    ttl: Duration,
    session: Option<Session>,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("lease", &self.session.as_ref().map(|s| s.lease))
            .finish()
    }
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn lease(&self) -> Option<LeaseId> {
        self.session.as_ref().map(|s| s.lease)
    }

    /// Release the key, then revoke the lease whatever the release outcome.
    ///
    /// Returns the first error encountered.
    pub async fn unlock(mut self) -> LockResult<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        release(&self.key, self.ttl, session).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                let key = self.key.clone();
                let ttl = self.ttl;
                handle.spawn(async move {
                    if let Err(e) = release(&key, ttl, session).await {
                        warn!(%key, error = %e, "background lock release failed");
                    }
                });
            }
            // Session's own drop stops the keep-alive.
            Err(_) => warn!(key = %self.key, "no runtime to release lock, lease left to expire"),
        }
    }
}

async fn release(key: &str, ttl: Duration, session: Session) -> LockResult<()> {
    let lease = session.lease;
    let released = match timeout(ttl, session.backend.release(key, lease)).await {
        Ok(result) => result,
        Err(_) => Err(LockError::Timeout {
            key: key.to_string(),
            after: ttl,
        }),
    };
    let closed = session.close(ttl).await;
    debug!(%key, %lease, released = released.is_ok(), closed = closed.is_ok(), "lock released");
    released.and(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BoxFuture;
    use crate::memory::MemoryBackend;

    fn mutex(backend: &MemoryBackend, key: &str, ttl_ms: u64) -> DistributedMutex {
        DistributedMutex::new(
            Arc::new(backend.clone()),
            key,
            Duration::from_millis(ttl_ms),
        )
        .unwrap()
    }

    #[test]
    fn empty_key_is_rejected() {
        let backend: Arc<dyn LockBackend> = Arc::new(MemoryBackend::new());
        let err = DistributedMutex::new(backend, "", Duration::from_secs(1)).unwrap_err();
        assert_eq!(err, LockError::KeyIsEmpty);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let backend: Arc<dyn LockBackend> = Arc::new(MemoryBackend::new());
        let err = DistributedMutex::new(backend, "k", Duration::ZERO).unwrap_err();
        assert_eq!(err, LockError::InvalidTtl);
    }

    #[test]
    fn key_gets_leading_slash() {
        let backend = MemoryBackend::new();
        assert_eq!(mutex(&backend, "sched/pool", 100).key(), "/sched/pool");
        assert_eq!(mutex(&backend, "/sched/pool", 100).key(), "/sched/pool");
    }

    #[tokio::test]
    async fn lock_then_unlock_tears_down_lease() {
        let backend = MemoryBackend::new();
        let m = mutex(&backend, "k", 1_000);

        let guard = m.lock().await.unwrap();
        let lease = guard.lease().unwrap();
        assert_eq!(backend.holder("/k").await, Some(lease));

        guard.unlock().await.unwrap();
        assert_eq!(backend.holder("/k").await, None);
        assert!(!backend.is_live(lease).await);
    }

    #[tokio::test]
    async fn contended_lock_times_out() {
        let backend = MemoryBackend::new();
        let holder = mutex(&backend, "k", 5_000).lock().await.unwrap();

        let err = mutex(&backend, "k", 50).lock().await.unwrap_err();
        assert!(matches!(err, LockError::Timeout { ref key, .. } if key == "/k"));

        // The failed attempt must not leave a lease behind.
        holder.unlock().await.unwrap();
        assert_eq!(backend.holder("/k").await, None);
    }

    #[tokio::test]
    async fn waiter_acquires_after_unlock() {
        let backend = MemoryBackend::new();
        let first = mutex(&backend, "k", 1_000).lock().await.unwrap();

        let second = mutex(&backend, "k", 1_000);
        let waiter = tokio::spawn(async move { second.lock().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        first.unlock().await.unwrap();
        let guard = waiter.await.unwrap().unwrap();
        assert_eq!(backend.holder("/k").await, guard.lease());
        guard.unlock().await.unwrap();
    }

    #[tokio::test]
    async fn dropped_guard_releases_in_background() {
        let backend = MemoryBackend::new();
        let m = mutex(&backend, "k", 1_000);

        let guard = m.lock().await.unwrap();
        drop(guard);

        let again = tokio::time::timeout(Duration::from_millis(500), m.lock())
            .await
            .expect("dropped guard should release")
            .unwrap();
        again.unlock().await.unwrap();
    }

    #[tokio::test]
    async fn keep_alive_holds_lock_past_ttl() {
        let backend = MemoryBackend::new();
        let guard = mutex(&backend, "k", 60).lock().await.unwrap();
        let lease = guard.lease();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(backend.holder("/k").await, lease);
        guard.unlock().await.unwrap();
    }

    #[tokio::test]
    async fn unlock_after_lease_loss_still_revokes() {
        let backend = MemoryBackend::new();
        let guard = mutex(&backend, "k", 1_000).lock().await.unwrap();
        let lease = guard.lease().unwrap();

        // Someone else tore the lease down under us.
        backend.revoke_lease(lease).await.unwrap();

        let err = guard.unlock().await.unwrap_err();
        assert_eq!(err, LockError::NotHeld("/k".to_string()));
        assert!(!backend.is_live(lease).await);
    }

    /// Delays every release, leaving room to cancel an unlock mid-flight.
    struct SlowRelease(MemoryBackend);

    impl LockBackend for SlowRelease {
        fn grant_lease(&self, ttl: Duration) -> BoxFuture<'_, LockResult<LeaseId>> {
            self.0.grant_lease(ttl)
        }

        fn keep_alive(&self, lease: LeaseId) -> BoxFuture<'_, LockResult<()>> {
            self.0.keep_alive(lease)
        }

        fn revoke_lease(&self, lease: LeaseId) -> BoxFuture<'_, LockResult<()>> {
            self.0.revoke_lease(lease)
        }

        fn acquire<'a>(&'a self, key: &'a str, lease: LeaseId) -> BoxFuture<'a, LockResult<()>> {
            self.0.acquire(key, lease)
        }

        fn release<'a>(&'a self, key: &'a str, lease: LeaseId) -> BoxFuture<'a, LockResult<()>> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.0.release(key, lease).await
            })
        }
    }

    #[tokio::test]
    async fn cancelled_unlock_still_frees_key() {
        let backend = MemoryBackend::new();
        let m = DistributedMutex::new(
            Arc::new(SlowRelease(backend.clone())),
            "k",
            Duration::from_secs(1),
        )
        .unwrap();
        let guard = m.lock().await.unwrap();
        let lease = guard.lease().unwrap();

        let cancelled = tokio::time::timeout(Duration::from_millis(5), guard.unlock()).await;
        assert!(cancelled.is_err());

        // Well within the ttl, so only a revoke can have freed the key.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(backend.holder("/k").await, None);
        assert!(!backend.is_live(lease).await);
    }

    #[tokio::test]
    async fn cancelled_lock_revokes_its_lease() {
        let backend = MemoryBackend::new();
        let held = mutex(&backend, "k", 5_000).lock().await.unwrap();
        let holder = held.lease().unwrap();

        let waiter = mutex(&backend, "k", 1_000);
        let cancelled = tokio::time::timeout(Duration::from_millis(10), waiter.lock()).await;
        assert!(cancelled.is_err());

        tokio::time::sleep(Duration::from_millis(30)).await;
        // Leases are numbered in grant order; the waiter's came second.
        assert!(!backend.is_live(LeaseId(holder.0 + 1)).await);
        assert_eq!(backend.holder("/k").await, Some(holder));
        held.unlock().await.unwrap();
    }
}

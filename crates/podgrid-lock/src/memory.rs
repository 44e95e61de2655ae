//! In-process lock backend.
//!
//! Keeps leases and key holders in a table guarded by a tokio mutex.
//! Waiters are woken whenever a key is released or a lease revoked, and
//! re-check at the holder's lease expiry so a dead holder cannot wedge them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use crate::backend::{BoxFuture, LeaseId, LockBackend};
use crate::error::{LockError, LockResult};

#[derive(Debug)]
struct Lease {
    ttl: Duration,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Table {
    next_lease: u64,
    leases: HashMap<LeaseId, Lease>,
    /// Key → holding lease.
    holders: HashMap<String, LeaseId>,
}

impl Table {
    /// Drop expired leases and the keys they held.
    fn expire(&mut self, now: Instant) {
        let before = self.leases.len();
        self.leases.retain(|_, lease| lease.expires_at > now);
        if self.leases.len() != before {
            let leases = &self.leases;
            self.holders.retain(|_, lease| leases.contains_key(lease));
            debug!(expired = before - self.leases.len(), "leases expired");
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    table: Mutex<Table>,
    changed: Notify,
}

/// Lease table shared by every mutex created over it.
///
/// Cloning shares the table, so clones coordinate with each other.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder of `key`, if its lease is still live.
    pub async fn holder(&self, key: &str) -> Option<LeaseId> {
        let mut table = self.inner.table.lock().await;
        table.expire(Instant::now());
        table.holders.get(key).copied()
    }

    /// True if `lease` exists and has not expired.
    pub async fn is_live(&self, lease: LeaseId) -> bool {
        let mut table = self.inner.table.lock().await;
        table.expire(Instant::now());
        table.leases.contains_key(&lease)
    }

    async fn acquire_inner(&self, key: &str, lease: LeaseId) -> LockResult<()> {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let holder_expiry = {
                let mut table = self.inner.table.lock().await;
                table.expire(Instant::now());
                if !table.leases.contains_key(&lease) {
                    return Err(LockError::LeaseNotFound(lease));
                }
                match table.holders.get(key).copied() {
                    None => {
                        table.holders.insert(key.to_string(), lease);
                        debug!(%key, %lease, "lock acquired");
                        return Ok(());
                    }
                    Some(holder) if holder == lease => return Ok(()),
                    Some(holder) => table.leases.get(&holder).map(|l| l.expires_at),
                }
            };

            match holder_expiry {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }
}

impl LockBackend for MemoryBackend {
    fn grant_lease(&self, ttl: Duration) -> BoxFuture<'_, LockResult<LeaseId>> {
        Box::pin(async move {
            if ttl.is_zero() {
                return Err(LockError::InvalidTtl);
            }
            let mut table = self.inner.table.lock().await;
            table.next_lease += 1;
            let id = LeaseId(table.next_lease);
            table.leases.insert(
                id,
                Lease {
                    ttl,
                    expires_at: Instant::now() + ttl,
                },
            );
            debug!(lease = %id, ?ttl, "lease granted");
            Ok(id)
        })
    }

    fn keep_alive(&self, lease: LeaseId) -> BoxFuture<'_, LockResult<()>> {
        Box::pin(async move {
            let now = Instant::now();
            let mut table = self.inner.table.lock().await;
            table.expire(now);
            let entry = table
                .leases
                .get_mut(&lease)
                .ok_or(LockError::LeaseNotFound(lease))?;
            entry.expires_at = now + entry.ttl;
            Ok(())
        })
    }

    fn revoke_lease(&self, lease: LeaseId) -> BoxFuture<'_, LockResult<()>> {
        Box::pin(async move {
            let mut table = self.inner.table.lock().await;
            table.expire(Instant::now());
            if table.leases.remove(&lease).is_none() {
                return Err(LockError::LeaseNotFound(lease));
            }
            table.holders.retain(|_, holder| *holder != lease);
            drop(table);
            self.inner.changed.notify_waiters();
            debug!(%lease, "lease revoked");
            Ok(())
        })
    }

    fn acquire<'a>(&'a self, key: &'a str, lease: LeaseId) -> BoxFuture<'a, LockResult<()>> {
        Box::pin(self.acquire_inner(key, lease))
    }

    fn release<'a>(&'a self, key: &'a str, lease: LeaseId) -> BoxFuture<'a, LockResult<()>> {
        Box::pin(async move {
            let mut table = self.inner.table.lock().await;
            table.expire(Instant::now());
            if table.holders.get(key) != Some(&lease) {
                return Err(LockError::NotHeld(key.to_string()));
            }
            table.holders.remove(key);
            drop(table);
            self.inner.changed.notify_waiters();
            debug!(%key, %lease, "lock released");
            Ok(())
        })
    }
}

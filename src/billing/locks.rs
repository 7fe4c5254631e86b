//! Per-entity async locks.
//!
//! Direct payment and webhook settlement of the same invoice run under the
//! same invoice lock. Tenant-wide rules (one active subscription, seat
//! limits) run under the tenant lock. A pay request carrying an
//! idempotency key holds the key lock for its whole duration.
//!
//! Lock order: idempotency key, invoice, tenant.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Lazily created mutex per key.
///
/// An entry lives only while a guard holds it or a task waits on it.
pub struct KeyedLocks<K>
where
    K: Eq + Hash,
{
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> KeyedLockGuard<'_, K> {
        // the map shard guard is released before awaiting
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        KeyedLockGuard {
            locks: &self.locks,
            key,
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to one key of a [`KeyedLocks`].
///
/// Dropping the last guard for a key with no waiters removes its entry.
pub struct KeyedLockGuard<'a, K>
where
    K: Eq + Hash,
{
    locks: &'a DashMap<K, Arc<Mutex<()>>>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K> Drop for KeyedLockGuard<'_, K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        // release first so the guard's own Arc is not counted
        self.guard.take();
        // waiters hold a clone, and cloning happens under the shard lock
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// The locks shared by every billing service.
#[derive(Default)]
pub struct LockRegistry {
    idempotency_keys: KeyedLocks<String>,
    invoices: KeyedLocks<i64>,
    tenants: KeyedLocks<Uuid>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn idempotency_key(&self, key: &str) -> KeyedLockGuard<'_, String> {
        self.idempotency_keys.lock(key.to_string()).await
    }

    pub async fn invoice(&self, invoice_id: i64) -> KeyedLockGuard<'_, i64> {
        self.invoices.lock(invoice_id).await
    }

    pub async fn tenant(&self, tenant_id: Uuid) -> KeyedLockGuard<'_, Uuid> {
        self.tenants.lock(tenant_id).await
    }

    /// Entries across all three maps.
    pub fn len(&self) -> usize {
        self.idempotency_keys.len() + self.invoices.len() + self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Per-tenant single-flight guard for alert scans.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use sqlx::{PgPool, Postgres, Transaction};
use tracing::warn;

use stockwise_core::TenantId;

use crate::store::{StoreError, map_sqlx_error};

/// Namespace half of the two-key advisory lock, so scan locks cannot collide
/// with other advisory locks on the same database.
const SCAN_LOCK_NAMESPACE: i32 = 0x5354_4b41;

/// At most one holder per tenant at a time.
#[async_trait::async_trait]
pub trait TenantLock: Send + Sync {
    /// `None` if another holder already has the tenant.
    async fn try_acquire(&self, tenant_id: TenantId) -> Result<Option<TenantLockGuard>, StoreError>;
}

#[async_trait::async_trait]
trait HeldLock: Send {
    async fn release(self: Box<Self>);
}

/// Held lock. Call [`TenantLockGuard::release`] when done; dropping it also
/// releases, but a Postgres lock then lingers until the connection is reused.
pub struct TenantLockGuard {
    inner: Box<dyn HeldLock>,
}

impl TenantLockGuard {
    pub async fn release(self) {
        self.inner.release().await;
    }
}

impl std::fmt::Debug for TenantLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantLockGuard").finish_non_exhaustive()
    }
}

/// Process-local lock set. Only correct with a single engine instance.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTenantLock {
    held: Arc<Mutex<HashSet<TenantId>>>,
}

impl InMemoryTenantLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, tenant_id: TenantId) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(&tenant_id))
            .unwrap_or(false)
    }
}

struct MemoryHeld {
    held: Arc<Mutex<HashSet<TenantId>>>,
    tenant_id: TenantId,
}

impl Drop for MemoryHeld {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.tenant_id);
        }
    }
}

#[async_trait::async_trait]
impl HeldLock for MemoryHeld {
    async fn release(self: Box<Self>) {}
}

#[async_trait::async_trait]
impl TenantLock for InMemoryTenantLock {
    async fn try_acquire(&self, tenant_id: TenantId) -> Result<Option<TenantLockGuard>, StoreError> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        if !held.insert(tenant_id) {
            return Ok(None);
        }
        Ok(Some(TenantLockGuard {
            inner: Box::new(MemoryHeld {
                held: self.held.clone(),
                tenant_id,
            }),
        }))
    }
}

/// Cluster-wide lock on a transaction-scoped advisory lock: it is released
/// when the holding transaction ends, so a crashed holder cannot leak it.
#[derive(Debug, Clone)]
pub struct PostgresTenantLock {
    pool: PgPool,
}

impl PostgresTenantLock {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct PostgresHeld {
    tenant_id: TenantId,
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl HeldLock for PostgresHeld {
    async fn release(self: Box<Self>) {
        if let Err(err) = self.tx.commit().await {
            warn!(tenant_id = %self.tenant_id, error = %err, "failed to release scan lock");
        }
    }
}

#[async_trait::async_trait]
impl TenantLock for PostgresTenantLock {
    async fn try_acquire(&self, tenant_id: TenantId) -> Result<Option<TenantLockGuard>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_scan_lock", e))?;

        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_xact_lock($1, hashtext($2))")
            .bind(SCAN_LOCK_NAMESPACE)
            .bind(tenant_id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("try_scan_lock", e))?;

        if !acquired {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        }
        Ok(Some(TenantLockGuard {
            inner: Box::new(PostgresHeld { tenant_id, tx }),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_fails_until_release() {
        let lock = InMemoryTenantLock::new();
        let tenant = TenantId::new();

        let guard = lock.try_acquire(tenant).await.unwrap().unwrap();
        assert!(lock.try_acquire(tenant).await.unwrap().is_none());
        assert!(lock.is_held(tenant));

        // Other tenants are independent.
        let other = lock.try_acquire(TenantId::new()).await.unwrap();
        assert!(other.is_some());

        guard.release().await;
        assert!(!lock.is_held(tenant));
        assert!(lock.try_acquire(tenant).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn dropping_the_guard_releases() {
        let lock = InMemoryTenantLock::new();
        let tenant = TenantId::new();
        drop(lock.try_acquire(tenant).await.unwrap());
        assert!(!lock.is_held(tenant));
    }
}

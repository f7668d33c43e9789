use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::{Mutex, OwnedMutexGuard};

use stockwise_core::{ExpectedVersion, ProductId, TenantId};
use stockwise_inventory::audit::sort_newest_first;
use stockwise_inventory::{Alert, AlertConfig, AuditEntry, AuditPage, AuditQuery, ProductInfo, StockLevel};

use super::{AlertConfigStore, AlertHistory, AuditStore, InventoryStore, InventoryTx, ProductCatalog, StoreError};

#[derive(Debug, Default)]
struct LedgerState {
    levels: HashMap<(TenantId, ProductId), StockLevel>,
    audit: Vec<AuditEntry>,
}

/// In-memory implementation of every store trait.
///
/// Intended for tests/dev. Write transactions hold one async mutex for their
/// whole lifetime, so they are fully serialized.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    ledger: Arc<Mutex<LedgerState>>,
    products: RwLock<HashMap<(TenantId, ProductId), ProductInfo>>,
    alert_configs: RwLock<HashMap<TenantId, AlertConfig>>,
    alerts: RwLock<HashMap<TenantId, Vec<Alert>>>,
    fail_commits: Arc<AtomicBool>,
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a catalog entry.
    pub fn put_product(&self, product: ProductInfo) {
        if let Ok(mut products) = self.products.write() {
            products.insert((product.tenant_id, product.id), product);
        }
    }

    /// Overwrite a level without any validation or audit, as a corrupting
    /// external write would.
    #[cfg(test)]
    pub(crate) async fn force_level(&self, tenant_id: TenantId, level: StockLevel) {
        let mut ledger = self.ledger.lock().await;
        ledger.levels.insert((tenant_id, level.product_id), level);
    }

    pub async fn audit_count(&self, tenant_id: TenantId) -> usize {
        let ledger = self.ledger.lock().await;
        ledger.audit.iter().filter(|e| e.tenant_id == tenant_id).count()
    }

    /// Make every following commit fail (simulates a lost connection).
    #[cfg(test)]
    pub(crate) fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl InventoryStore for InMemoryStore {
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn InventoryTx>, StoreError> {
        let guard = self.ledger.clone().lock_owned().await;
        Ok(Box::new(InMemoryTx {
            tenant_id,
            guard,
            staged_levels: HashMap::new(),
            staged_audit: Vec::new(),
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }))
    }

    async fn get_level(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<StockLevel>, StoreError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.levels.get(&(tenant_id, product_id)).copied())
    }

    async fn list_levels(&self, tenant_id: TenantId) -> Result<Vec<StockLevel>, StoreError> {
        let ledger = self.ledger.lock().await;
        let mut levels: Vec<StockLevel> = ledger
            .levels
            .iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|(_, level)| *level)
            .collect();
        levels.sort_by_key(|l| l.product_id);
        Ok(levels)
    }
}

struct InMemoryTx {
    tenant_id: TenantId,
    guard: OwnedMutexGuard<LedgerState>,
    /// `None` marks a staged delete.
    staged_levels: HashMap<ProductId, Option<StockLevel>>,
    staged_audit: Vec<AuditEntry>,
    fail_commit: bool,
}

impl InMemoryTx {
    fn current(&self, product_id: ProductId) -> Option<StockLevel> {
        match self.staged_levels.get(&product_id) {
            Some(staged) => *staged,
            None => self.guard.levels.get(&(self.tenant_id, product_id)).copied(),
        }
    }

    fn check_version(&self, product_id: ProductId, expected: ExpectedVersion) -> Result<StockLevel, StoreError> {
        let current = self
            .current(product_id)
            .ok_or_else(|| StoreError::NotFound(format!("stock record {product_id}")))?;
        if !expected.matches(current.version) {
            return Err(StoreError::Concurrency(format!(
                "stock record {product_id}: expected {expected:?}, found {}",
                current.version
            )));
        }
        Ok(current)
    }
}

#[async_trait::async_trait]
impl InventoryTx for InMemoryTx {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    async fn lock_levels(
        &mut self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, StockLevel>, StoreError> {
        // The whole ledger is already held; only the lookup is needed.
        Ok(product_ids
            .iter()
            .filter_map(|id| self.current(*id).map(|level| (*id, level)))
            .collect())
    }

    async fn insert_level(&mut self, level: &StockLevel) -> Result<StockLevel, StoreError> {
        if self.current(level.product_id).is_some() {
            return Err(StoreError::Concurrency(format!(
                "stock record {} already exists",
                level.product_id
            )));
        }
        let stored = StockLevel { version: 1, ..*level };
        self.staged_levels.insert(level.product_id, Some(stored));
        Ok(stored)
    }

    async fn save_level(
        &mut self,
        level: &StockLevel,
        expected: ExpectedVersion,
    ) -> Result<StockLevel, StoreError> {
        let current = self.check_version(level.product_id, expected)?;
        let stored = StockLevel {
            version: current.version + 1,
            ..*level
        };
        self.staged_levels.insert(level.product_id, Some(stored));
        Ok(stored)
    }

    async fn delete_level(
        &mut self,
        product_id: ProductId,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        self.check_version(product_id, expected)?;
        self.staged_levels.insert(product_id, None);
        Ok(())
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), StoreError> {
        if entry.tenant_id != self.tenant_id {
            return Err(StoreError::Backend(format!(
                "audit entry for tenant {} in transaction of tenant {}",
                entry.tenant_id, self.tenant_id
            )));
        }
        self.staged_audit.push(entry.clone());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        if self.fail_commit {
            return Err(StoreError::Backend("commit failed: connection reset".to_string()));
        }
        let tenant_id = self.tenant_id;
        let staged_levels = std::mem::take(&mut self.staged_levels);
        let staged_audit = std::mem::take(&mut self.staged_audit);
        for (product_id, level) in staged_levels {
            match level {
                Some(level) => {
                    self.guard.levels.insert((tenant_id, product_id), level);
                }
                None => {
                    self.guard.levels.remove(&(tenant_id, product_id));
                }
            }
        }
        self.guard.audit.extend(staged_audit);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuditStore for InMemoryStore {
    async fn query(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<AuditPage, StoreError> {
        let ledger = self.ledger.lock().await;
        Ok(query.paginate(
            ledger
                .audit
                .iter()
                .filter(|e| e.tenant_id == tenant_id)
                .cloned(),
        ))
    }

    async fn entries(
        &self,
        tenant_id: TenantId,
        query: &AuditQuery,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let ledger = self.ledger.lock().await;
        let mut entries: Vec<AuditEntry> = ledger
            .audit
            .iter()
            .filter(|e| e.tenant_id == tenant_id && query.matches(e))
            .cloned()
            .collect();
        sort_newest_first(&mut entries);
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl ProductCatalog for InMemoryStore {
    async fn get_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<ProductInfo>, StoreError> {
        let products = self.products.read().map_err(|_| poisoned())?;
        Ok(products.get(&(tenant_id, product_id)).cloned())
    }

    async fn get_products(
        &self,
        tenant_id: TenantId,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductInfo>, StoreError> {
        let products = self.products.read().map_err(|_| poisoned())?;
        Ok(product_ids
            .iter()
            .filter_map(|id| products.get(&(tenant_id, *id)).map(|p| (*id, p.clone())))
            .collect())
    }

    async fn list_physical(&self, tenant_id: TenantId) -> Result<Vec<ProductInfo>, StoreError> {
        let products = self.products.read().map_err(|_| poisoned())?;
        let mut physical: Vec<ProductInfo> = products
            .values()
            .filter(|p| p.tenant_id == tenant_id && !p.is_service)
            .cloned()
            .collect();
        physical.sort_by_key(|p| p.id);
        Ok(physical)
    }

    async fn upsert_product(&self, product: &ProductInfo) -> Result<(), StoreError> {
        let mut products = self.products.write().map_err(|_| poisoned())?;
        products.insert((product.tenant_id, product.id), product.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl AlertConfigStore for InMemoryStore {
    async fn get_config(&self, tenant_id: TenantId) -> Result<Option<AlertConfig>, StoreError> {
        let configs = self.alert_configs.read().map_err(|_| poisoned())?;
        Ok(configs.get(&tenant_id).cloned())
    }

    async fn put_config(&self, tenant_id: TenantId, config: &AlertConfig) -> Result<(), StoreError> {
        let mut configs = self.alert_configs.write().map_err(|_| poisoned())?;
        configs.insert(tenant_id, config.clone());
        Ok(())
    }

    async fn configured_tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        let configs = self.alert_configs.read().map_err(|_| poisoned())?;
        let mut tenants: Vec<TenantId> = configs.keys().copied().collect();
        tenants.sort();
        Ok(tenants)
    }
}

#[async_trait::async_trait]
impl AlertHistory for InMemoryStore {
    async fn record_alert(&self, tenant_id: TenantId, alert: &Alert) -> Result<(), StoreError> {
        let mut alerts = self.alerts.write().map_err(|_| poisoned())?;
        alerts.entry(tenant_id).or_default().push(alert.clone());
        Ok(())
    }

    async fn recent_alerts(&self, tenant_id: TenantId, limit: u32) -> Result<Vec<Alert>, StoreError> {
        let alerts = self.alerts.read().map_err(|_| poisoned())?;
        Ok(alerts
            .get(&tenant_id)
            .map(|all| all.iter().rev().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockwise_inventory::{AuditOperation, Movement, MovementType};

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    #[tokio::test]
    async fn dropped_transaction_discards_staged_writes() {
        let store = InMemoryStore::new();
        let tenant = test_tenant_id();
        let product = ProductId::new();

        {
            let mut tx = store.begin(tenant).await.unwrap();
            tx.insert_level(&StockLevel::new(product)).await.unwrap();
        }
        assert_eq!(store.get_level(tenant, product).await.unwrap(), None);

        let mut tx = store.begin(tenant).await.unwrap();
        tx.insert_level(&StockLevel::new(product)).await.unwrap();
        tx.commit().await.unwrap();
        let level = store.get_level(tenant, product).await.unwrap().unwrap();
        assert_eq!(level.version, 1);
    }

    #[tokio::test]
    async fn stale_version_is_a_concurrency_error() {
        let store = InMemoryStore::new();
        let tenant = test_tenant_id();
        let product = ProductId::new();

        let mut tx = store.begin(tenant).await.unwrap();
        let stored = tx.insert_level(&StockLevel::new(product)).await.unwrap();
        let saved = tx
            .save_level(&StockLevel { quantity: 4, available: 4, ..stored }, ExpectedVersion::Exact(1))
            .await
            .unwrap();
        assert_eq!(saved.version, 2);

        let err = tx
            .save_level(&saved, ExpectedVersion::Exact(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
    }

    #[tokio::test]
    async fn levels_and_audit_are_tenant_scoped() {
        let store = InMemoryStore::new();
        let a = test_tenant_id();
        let b = test_tenant_id();
        let product = ProductId::new();

        let mut tx = store.begin(a).await.unwrap();
        let level = tx.insert_level(&StockLevel::new(product)).await.unwrap();
        let movement = Movement::new(product, 3, MovementType::Entrada, "Carga inicial");
        let (next, outcome) = level.apply_movement(&movement).unwrap();
        tx.save_level(&next, ExpectedVersion::Exact(level.version)).await.unwrap();
        tx.append_audit(&AuditEntry::movement(a, "Tornillo", &movement, &outcome, chrono::Utc::now()))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(store.get_level(b, product).await.unwrap().is_none());
        assert_eq!(store.audit_count(a).await, 1);
        assert_eq!(store.audit_count(b).await, 0);

        let page = store.query(a, &AuditQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(
            page.entries[0].operation,
            AuditOperation::Movement(MovementType::Entrada)
        );
    }

    #[tokio::test]
    async fn audit_entries_cannot_cross_tenants() {
        let store = InMemoryStore::new();
        let a = test_tenant_id();
        let product = ProductInfo::physical(test_tenant_id(), ProductId::new(), "Ajeno");
        let entry = AuditEntry::lifecycle(
            product.tenant_id,
            &product,
            AuditOperation::ProductRegistered,
            &StockLevel::new(product.id),
            None,
            chrono::Utc::now(),
        );
        let mut tx = store.begin(a).await.unwrap();
        assert!(tx.append_audit(&entry).await.is_err());
    }
}

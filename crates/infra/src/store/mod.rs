//! Persistence boundary of the engine.
//!
//! Writes go through an [`InventoryTx`]: the level rows touched by one business
//! event are locked in ascending product order, updated with a version
//! compare-and-swap and committed together with their audit entries. Reads that
//! do not feed a write use the store directly.

pub mod in_memory;
pub mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use stockwise_core::{ExpectedVersion, ProductId, TenantId};
use stockwise_inventory::{Alert, AlertConfig, AuditEntry, AuditPage, AuditQuery, ProductInfo, StockLevel};

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Version compare-and-swap miss or unique violation.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("storage error: {0}")]
    Backend(String),
}

/// Map a SQLx error onto [`StoreError`].
///
/// | SQLx error | Postgres code | StoreError |
/// |---|---|---|
/// | Database (unique violation) | `23505` | `Concurrency` |
/// | Database (serialization failure) | `40001` | `Concurrency` |
/// | Database (deadlock detected) | `40P01` | `Concurrency` |
/// | Database (other) | any | `Backend` |
/// | RowNotFound | n/a | `NotFound` |
/// | PoolClosed / other | n/a | `Backend` |
pub fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") | Some("40P01") => StoreError::Concurrency(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("unexpected row not found in {operation}")),
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        sqlx::Error::ColumnDecode { index, source } => {
            StoreError::Corrupt(format!("column {index} in {operation}: {source}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

/// Stock and availability records plus the transactional write path.
#[async_trait::async_trait]
pub trait InventoryStore: Send + Sync {
    /// Open a tenant-scoped write transaction.
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn InventoryTx>, StoreError>;

    async fn get_level(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<StockLevel>, StoreError>;

    async fn list_levels(&self, tenant_id: TenantId) -> Result<Vec<StockLevel>, StoreError>;
}

/// One open write transaction. Dropping it without `commit` discards every
/// staged change.
#[async_trait::async_trait]
pub trait InventoryTx: Send {
    fn tenant_id(&self) -> TenantId;

    /// Lock and load the levels of `product_ids` (deduplicated, locked in
    /// ascending order). Products without a record are absent from the map.
    async fn lock_levels(
        &mut self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, StockLevel>, StoreError>;

    /// Create a record at version 1. Fails with `Concurrency` if it exists.
    async fn insert_level(&mut self, level: &StockLevel) -> Result<StockLevel, StoreError>;

    /// Write `level` if the stored version matches `expected`; returns the
    /// level with its bumped version.
    async fn save_level(
        &mut self,
        level: &StockLevel,
        expected: ExpectedVersion,
    ) -> Result<StockLevel, StoreError>;

    async fn delete_level(
        &mut self,
        product_id: ProductId,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Read side of the audit ledger.
#[async_trait::async_trait]
pub trait AuditStore: Send + Sync {
    /// One page of matching entries, newest first.
    async fn query(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<AuditPage, StoreError>;

    /// Every matching entry, newest first; pagination fields are ignored.
    async fn entries(
        &self,
        tenant_id: TenantId,
        query: &AuditQuery,
    ) -> Result<Vec<AuditEntry>, StoreError>;
}

/// Product master data owned by the catalog module.
#[async_trait::async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<ProductInfo>, StoreError>;

    async fn get_products(
        &self,
        tenant_id: TenantId,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductInfo>, StoreError>;

    /// All products of the tenant that carry inventory.
    async fn list_physical(&self, tenant_id: TenantId) -> Result<Vec<ProductInfo>, StoreError>;

    /// Mirror a catalog entry (used at product registration).
    async fn upsert_product(&self, product: &ProductInfo) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait AlertConfigStore: Send + Sync {
    async fn get_config(&self, tenant_id: TenantId) -> Result<Option<AlertConfig>, StoreError>;

    async fn put_config(&self, tenant_id: TenantId, config: &AlertConfig) -> Result<(), StoreError>;

    /// Tenants that stored their own config.
    async fn configured_tenants(&self) -> Result<Vec<TenantId>, StoreError>;
}

/// Persisted record of critical alerts.
#[async_trait::async_trait]
pub trait AlertHistory: Send + Sync {
    async fn record_alert(&self, tenant_id: TenantId, alert: &Alert) -> Result<(), StoreError>;

    async fn recent_alerts(&self, tenant_id: TenantId, limit: u32) -> Result<Vec<Alert>, StoreError>;
}

/// Every store the services need, behind trait objects.
#[derive(Clone)]
pub struct Stores {
    pub inventory: Arc<dyn InventoryStore>,
    pub audit: Arc<dyn AuditStore>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub alert_configs: Arc<dyn AlertConfigStore>,
    pub alert_history: Arc<dyn AlertHistory>,
}

impl Stores {
    /// All stores backed by one in-memory instance (tests and local runs).
    pub fn in_memory() -> (Self, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let stores = Self {
            inventory: store.clone(),
            audit: store.clone(),
            catalog: store.clone(),
            alert_configs: store.clone(),
            alert_history: store.clone(),
        };
        (stores, store)
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let store = Arc::new(PostgresStore::new(pool));
        Self {
            inventory: store.clone(),
            audit: store.clone(),
            catalog: store.clone(),
            alert_configs: store.clone(),
            alert_history: store,
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

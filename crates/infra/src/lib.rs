//! Infrastructure layer: stores, services, alerting and configuration.

pub mod alerts;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod sync;


use std::sync::Arc;

use stockwise_inventory::AlertConfig;

pub use alerts::{AlertEngine, AlertScheduler, Notifier, ScanOutcome, TenantLock};
pub use error::{ServiceError, ServiceResult};
pub use ledger::AuditLedger;
pub use reconcile::{Reconciler, ReconciliationReport};
pub use service::InventoryService;
pub use store::{StoreError, Stores};
pub use sync::SyncOrchestrator;

/// Every service of the engine over one set of stores.
#[derive(Debug, Clone)]
pub struct Engine {
    pub inventory: InventoryService,
    pub sync: SyncOrchestrator,
    pub ledger: AuditLedger,
    pub alerts: Arc<AlertEngine>,
    pub reconciler: Reconciler,
    pub stores: Stores,
}

impl Engine {
    pub fn new(
        stores: Stores,
        lock: Arc<dyn TenantLock>,
        notifier: Arc<dyn Notifier>,
        alert_defaults: AlertConfig,
    ) -> Self {
        Self {
            inventory: InventoryService::new(stores.clone()),
            sync: SyncOrchestrator::new(stores.clone()),
            ledger: AuditLedger::new(stores.clone()),
            alerts: Arc::new(
                AlertEngine::new(stores.clone(), lock, notifier).with_default_config(alert_defaults),
            ),
            reconciler: Reconciler::new(stores.clone()),
            stores,
        }
    }

    /// Engine on in-memory stores with a process-local scan lock.
    pub fn in_memory(notifier: Arc<dyn Notifier>) -> (Self, Arc<store::InMemoryStore>) {
        let (stores, memory) = Stores::in_memory();
        let engine = Self::new(
            stores,
            Arc::new(alerts::InMemoryTenantLock::new()),
            notifier,
            AlertConfig::default(),
        );
        (engine, memory)
    }

    /// Engine on Postgres with a cluster-wide scan lock.
    pub fn postgres(
        pool: sqlx::PgPool,
        notifier: Arc<dyn Notifier>,
        alert_defaults: AlertConfig,
    ) -> Self {
        Self::new(
            Stores::postgres(pool.clone()),
            Arc::new(alerts::PostgresTenantLock::new(pool)),
            notifier,
            alert_defaults,
        )
    }
}

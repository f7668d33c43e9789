//! Mirrors sales, purchases and quotations into inventory.
//!
//! Each request is one transaction: lock every physical product it names,
//! plan all lines against the locked levels, and only write when the plan is
//! clean. A rejected request leaves no trace in the stores.

use chrono::Utc;
use tracing::{info, instrument, warn};

use stockwise_core::{ExpectedVersion, ProductId};
use stockwise_inventory::sync::{self, SyncOperation};
use stockwise_inventory::{
    PurchaseOperation, ReservationOperation, SaleOperation, SyncRequest, SyncResult,
};

use crate::error::{ServiceResult, StoreResultExt};
use crate::service::finish;
use crate::store::Stores;

#[derive(Debug, Clone)]
pub struct SyncOrchestrator {
    stores: Stores,
}

impl SyncOrchestrator {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn sync_sale(&self, request: SyncRequest<SaleOperation>) -> ServiceResult<SyncResult> {
        self.sync(request).await
    }

    pub async fn sync_purchase(
        &self,
        request: SyncRequest<PurchaseOperation>,
    ) -> ServiceResult<SyncResult> {
        self.sync(request).await
    }

    pub async fn sync_reservation(
        &self,
        request: SyncRequest<ReservationOperation>,
    ) -> ServiceResult<SyncResult> {
        self.sync(request).await
    }

    /// Line-level failures come back inside an unsuccessful [`SyncResult`];
    /// `Err` is reserved for malformed requests and infrastructure failures.
    #[instrument(
        skip(self, request),
        fields(
            tenant_id = %request.tenant_id,
            event_id = %request.event_id,
            kind = ?Op::KIND,
            operation = ?request.operation,
            lines = request.items.len()
        ),
        err
    )]
    async fn sync<Op: SyncOperation>(&self, request: SyncRequest<Op>) -> ServiceResult<SyncResult> {
        request.validate()?;
        let tenant_id = request.tenant_id;

        let ids = request.product_ids();
        let products = self
            .stores
            .catalog
            .get_products(tenant_id, &ids)
            .await
            .or_system("get_products")?;
        let physical: Vec<ProductId> = ids
            .iter()
            .copied()
            .filter(|id| products.get(id).is_some_and(|p| !p.is_service))
            .collect();

        let mut tx = self.stores.inventory.begin(tenant_id).await.or_system("begin")?;
        let result: ServiceResult<SyncResult> = async {
            let levels = tx.lock_levels(&physical).await.or_system("lock_levels")?;
            let plan = sync::plan(&request, &products, &levels, Utc::now());
            if !plan.is_clean() {
                return Ok(plan.into_result());
            }
            for level in &plan.writes {
                tx.save_level(level, ExpectedVersion::Exact(level.version))
                    .await
                    .or_system("save_level")?;
            }
            for entry in &plan.entries {
                tx.append_audit(entry).await.or_system("append_audit")?;
            }
            Ok(plan.into_result())
        }
        .await;

        let result = match result {
            Ok(rejected) if !rejected.success => {
                if let Err(err) = tx.rollback().await {
                    warn!(error = %err, "rollback failed");
                }
                warn!(errors = rejected.errors.len(), "sync rejected, nothing applied");
                return Ok(rejected);
            }
            other => finish(tx, other, "sync").await?,
        };

        info!(
            products_affected = result.products_affected,
            movements_recorded = result.movements_recorded,
            "sync applied"
        );
        Ok(result)
    }
}

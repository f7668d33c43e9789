//! Repairs availability records that drifted outside `0..=stock`.
//!
//! Stock is treated as ground truth: only availability is ever rewritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use stockwise_core::{ExpectedVersion, ProductId, TenantId, UserId};
use stockwise_inventory::audit::{ConsistencyViolation, ViolationKind};
use stockwise_inventory::{AuditEntry, AuditOperation};

use crate::error::{ServiceResult, StoreResultExt};
use crate::service::finish;
use crate::store::Stores;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub available_before: i64,
    pub available_after: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub tenant_id: TenantId,
    pub checked: usize,
    pub corrected: usize,
    pub corrections: Vec<Correction>,
    /// Rows the engine will not touch: negative stock or a missing record.
    pub uncorrectable: Vec<ConsistencyViolation>,
    pub reconciled_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    stores: Stores,
}

impl Reconciler {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Clamp every out-of-range availability into `0..=stock`, one audit entry
    /// per fix, all in one transaction. Running it twice in a row yields no
    /// corrections the second time.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn reconcile(
        &self,
        tenant_id: TenantId,
        actor_id: Option<UserId>,
    ) -> ServiceResult<ReconciliationReport> {
        let products = self
            .stores
            .catalog
            .list_physical(tenant_id)
            .await
            .or_system("list_products")?;
        let ids: Vec<ProductId> = products.iter().map(|p| p.id).collect();

        let mut tx = self.stores.inventory.begin(tenant_id).await.or_system("begin")?;
        let result: ServiceResult<ReconciliationReport> = async {
            let levels = tx.lock_levels(&ids).await.or_system("lock_levels")?;
            let now = Utc::now();
            let mut corrections = Vec::new();
            let mut uncorrectable = Vec::new();

            for product in &products {
                let Some(level) = levels.get(&product.id) else {
                    uncorrectable.push(ConsistencyViolation {
                        product_id: product.id,
                        product_name: product.name.clone(),
                        quantity: None,
                        available: None,
                        kind: ViolationKind::MissingRecord,
                    });
                    continue;
                };
                if level.quantity < 0 {
                    uncorrectable.push(ConsistencyViolation {
                        product_id: product.id,
                        product_name: product.name.clone(),
                        quantity: Some(level.quantity),
                        available: Some(level.available),
                        kind: ViolationKind::NegativeStock,
                    });
                    continue;
                }

                let fixed = level.clamped();
                if fixed.available == level.available {
                    continue;
                }
                tx.save_level(&fixed, ExpectedVersion::Exact(level.version))
                    .await
                    .or_system("save_level")?;
                let reason = format!(
                    "Reconciliación: disponibilidad {} fuera de rango [0, {}]",
                    level.available, level.quantity
                );
                let entry = AuditEntry::availability(
                    tenant_id,
                    &product.name,
                    AuditOperation::Reconciliation,
                    level,
                    &fixed,
                    reason,
                    actor_id,
                    None,
                    now,
                );
                tx.append_audit(&entry).await.or_system("append_audit")?;
                corrections.push(Correction {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    quantity: level.quantity,
                    available_before: level.available,
                    available_after: fixed.available,
                });
            }

            Ok(ReconciliationReport {
                tenant_id,
                checked: products.len(),
                corrected: corrections.len(),
                corrections,
                uncorrectable,
                reconciled_at: now,
            })
        }
        .await;

        let report = finish(tx, result, "reconcile").await?;
        if !report.uncorrectable.is_empty() {
            warn!(count = report.uncorrectable.len(), "records left for manual review");
        }
        info!(checked = report.checked, corrected = report.corrected, "reconciliation finished");
        Ok(report)
    }
}

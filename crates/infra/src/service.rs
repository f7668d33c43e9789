//! Single-product operations: movements, availability overrides, lookups and
//! product registration.

use chrono::Utc;
use tracing::{info, instrument, warn};

use stockwise_core::{ExpectedVersion, ProductId, TenantId, UserId};
use stockwise_inventory::{
    AuditEntry, AuditOperation, InventoryError, Movement, MovementOutcome, ProductInfo, StockLevel,
    validation,
};

use crate::error::{ServiceError, ServiceResult, StoreResultExt};
use crate::store::{InventoryTx, Stores};

const DEFAULT_AVAILABILITY_REASON: &str = "Actualización manual de disponibilidad";

/// Commit `tx` if `result` is `Ok`, roll it back otherwise.
pub(crate) async fn finish<T>(
    tx: Box<dyn InventoryTx>,
    result: ServiceResult<T>,
    operation: &'static str,
) -> ServiceResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await.or_system(operation)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(operation, error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Lock the level of one product inside `tx`.
pub(crate) async fn lock_one(
    tx: &mut dyn InventoryTx,
    product_id: ProductId,
) -> ServiceResult<StockLevel> {
    tx.lock_levels(&[product_id])
        .await
        .or_system("lock_levels")?
        .remove(&product_id)
        .ok_or_else(|| InventoryError::StockRecordNotFound(product_id).into())
}

#[derive(Debug, Clone)]
pub struct InventoryService {
    stores: Stores,
}

impl InventoryService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    async fn physical_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> ServiceResult<ProductInfo> {
        let product = self
            .stores
            .catalog
            .get_product(tenant_id, product_id)
            .await
            .or_system("get_product")?;
        Ok(validation::ensure_physical(product.as_ref(), tenant_id, product_id)?.clone())
    }

    /// Apply one movement and record it in the ledger, atomically.
    #[instrument(
        skip(self, movement),
        fields(
            tenant_id = %tenant_id,
            product_id = %movement.product_id,
            movement_type = %movement.movement_type,
            quantity = movement.quantity
        ),
        err
    )]
    pub async fn apply_movement(
        &self,
        tenant_id: TenantId,
        movement: Movement,
    ) -> ServiceResult<MovementOutcome> {
        let product = self.physical_product(tenant_id, movement.product_id).await?;

        let mut tx = self.stores.inventory.begin(tenant_id).await.or_system("begin")?;
        let result: ServiceResult<MovementOutcome> = async {
            let level = lock_one(tx.as_mut(), movement.product_id).await?;
            let (next, outcome) = level.apply_movement(&movement)?;
            next.check_invariants()?;
            tx.save_level(&next, ExpectedVersion::Exact(level.version))
                .await
                .or_system("save_level")?;
            let entry = AuditEntry::movement(tenant_id, &product.name, &movement, &outcome, Utc::now());
            tx.append_audit(&entry).await.or_system("append_audit")?;
            Ok(outcome)
        }
        .await;

        let outcome = finish(tx, result, "apply_movement").await?;
        info!(
            previous_qty = outcome.previous_qty,
            new_qty = outcome.new_qty,
            "movement applied"
        );
        Ok(outcome)
    }

    /// Override the available quantity (bounded by stock).
    #[instrument(skip(self, reason), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    pub async fn update_availability(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        available: i64,
        reason: Option<&str>,
        actor_id: Option<UserId>,
    ) -> ServiceResult<StockLevel> {
        let reason = match reason {
            Some(reason) => validation::validate_reason(reason)?,
            None => DEFAULT_AVAILABILITY_REASON,
        };
        let product = self.physical_product(tenant_id, product_id).await?;

        let mut tx = self.stores.inventory.begin(tenant_id).await.or_system("begin")?;
        let result: ServiceResult<StockLevel> = async {
            let level = lock_one(tx.as_mut(), product_id).await?;
            let next = level.with_availability(available)?;
            let saved = tx
                .save_level(&next, ExpectedVersion::Exact(level.version))
                .await
                .or_system("save_level")?;
            let entry = AuditEntry::availability(
                tenant_id,
                &product.name,
                AuditOperation::AvailabilityUpdate,
                &level,
                &next,
                reason,
                actor_id,
                None,
                Utc::now(),
            );
            tx.append_audit(&entry).await.or_system("append_audit")?;
            Ok(saved)
        }
        .await;

        let saved = finish(tx, result, "update_availability").await?;
        info!(available = saved.available, "availability updated");
        Ok(saved)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    pub async fn get_level(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> ServiceResult<StockLevel> {
        self.physical_product(tenant_id, product_id).await?;
        self.stores
            .inventory
            .get_level(tenant_id, product_id)
            .await
            .or_system("get_level")?
            .ok_or_else(|| InventoryError::StockRecordNotFound(product_id).into())
    }

    pub async fn get_stock(&self, tenant_id: TenantId, product_id: ProductId) -> ServiceResult<i64> {
        Ok(self.get_level(tenant_id, product_id).await?.quantity)
    }

    pub async fn get_availability(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> ServiceResult<i64> {
        Ok(self.get_level(tenant_id, product_id).await?.available)
    }

    /// Mirror `product` into the catalog and create its zeroed records.
    #[instrument(skip(self, product), fields(tenant_id = %tenant_id, product_id = %product.id), err)]
    pub async fn register_product(
        &self,
        tenant_id: TenantId,
        product: ProductInfo,
        actor_id: Option<UserId>,
    ) -> ServiceResult<StockLevel> {
        let product = validation::ensure_physical(Some(&product), tenant_id, product.id)?.clone();
        if product.name.trim().is_empty() {
            return Err(InventoryError::InvalidQuery("product name cannot be empty".to_string()).into());
        }
        self.stores
            .catalog
            .upsert_product(&product)
            .await
            .or_system("upsert_product")?;

        let mut tx = self.stores.inventory.begin(tenant_id).await.or_system("begin")?;
        let result: ServiceResult<StockLevel> = async {
            if !tx.lock_levels(&[product.id]).await.or_system("lock_levels")?.is_empty() {
                return Err(InventoryError::AlreadyRegistered(product.id).into());
            }
            let level = tx
                .insert_level(&StockLevel::new(product.id))
                .await
                .map_err(|e| match e {
                    crate::store::StoreError::Concurrency(_) => {
                        ServiceError::Inventory(InventoryError::AlreadyRegistered(product.id))
                    }
                    other => ServiceError::from_store("insert_level", other),
                })?;
            let entry = AuditEntry::lifecycle(
                tenant_id,
                &product,
                AuditOperation::ProductRegistered,
                &level,
                actor_id,
                Utc::now(),
            );
            tx.append_audit(&entry).await.or_system("append_audit")?;
            Ok(level)
        }
        .await;

        let level = finish(tx, result, "register_product").await?;
        info!("product registered");
        Ok(level)
    }

    /// Remove the stock and availability records of a product. Its ledger
    /// history stays.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    pub async fn unregister_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        actor_id: Option<UserId>,
    ) -> ServiceResult<()> {
        let product = self.physical_product(tenant_id, product_id).await?;

        let mut tx = self.stores.inventory.begin(tenant_id).await.or_system("begin")?;
        let result: ServiceResult<()> = async {
            let level = lock_one(tx.as_mut(), product_id).await?;
            tx.delete_level(product_id, ExpectedVersion::Exact(level.version))
                .await
                .or_system("delete_level")?;
            let entry = AuditEntry::lifecycle(
                tenant_id,
                &product,
                AuditOperation::ProductRemoved,
                &level,
                actor_id,
                Utc::now(),
            );
            tx.append_audit(&entry).await.or_system("append_audit")?;
            Ok(())
        }
        .await;

        finish(tx, result, "unregister_product").await?;
        info!("product unregistered");
        Ok(())
    }
}

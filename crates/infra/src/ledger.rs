//! Read and write access to the append-only audit ledger.

use std::collections::HashMap;

use chrono::Utc;
use tracing::instrument;

use stockwise_core::{ProductId, TenantId};
use stockwise_inventory::audit::MAX_PAGE_LIMIT;
use stockwise_inventory::{
    AuditEntry, AuditPage, AuditQuery, AuditReport, AuditStatistics, ConsistencyReport, DateRange,
    StockLevel,
};

use crate::error::{ServiceResult, StoreResultExt};
use crate::service::finish;
use crate::store::Stores;

#[derive(Debug, Clone)]
pub struct AuditLedger {
    stores: Stores,
}

impl AuditLedger {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Append one entry on its own. Entries that accompany a state change are
    /// written by the owning service inside its transaction instead.
    #[instrument(skip(self, entry), fields(tenant_id = %entry.tenant_id, entry_id = %entry.id), err)]
    pub async fn record(&self, entry: &AuditEntry) -> ServiceResult<()> {
        let mut tx = self
            .stores
            .inventory
            .begin(entry.tenant_id)
            .await
            .or_system("begin")?;
        let result = tx.append_audit(entry).await.or_system("append_audit");
        finish(tx, result, "record_audit").await
    }

    #[instrument(skip(self, query), fields(tenant_id = %tenant_id, page = query.page, limit = query.limit), err)]
    pub async fn query(&self, tenant_id: TenantId, query: &AuditQuery) -> ServiceResult<AuditPage> {
        query.validate()?;
        self.stores
            .audit
            .query(tenant_id, query)
            .await
            .or_system("query_audit")
    }

    /// Latest `limit` entries of one product, newest first.
    pub async fn history(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        limit: u32,
    ) -> ServiceResult<Vec<AuditEntry>> {
        let query = AuditQuery {
            product_id: Some(product_id),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
            ..AuditQuery::default()
        };
        Ok(self.query(tenant_id, &query).await?.entries)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn statistics(
        &self,
        tenant_id: TenantId,
        date_range: DateRange,
    ) -> ServiceResult<AuditStatistics> {
        date_range.validate()?;
        let query = AuditQuery {
            date_range,
            ..AuditQuery::default()
        };
        let entries = self
            .stores
            .audit
            .entries(tenant_id, &query)
            .await
            .or_system("list_audit")?;
        Ok(AuditStatistics::from_entries(&entries))
    }

    /// Check every physical product against `0 <= available <= stock`.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn validate_consistency(&self, tenant_id: TenantId) -> ServiceResult<ConsistencyReport> {
        let products = self
            .stores
            .catalog
            .list_physical(tenant_id)
            .await
            .or_system("list_products")?;
        let levels: HashMap<ProductId, StockLevel> = self
            .stores
            .inventory
            .list_levels(tenant_id)
            .await
            .or_system("list_levels")?
            .into_iter()
            .map(|level| (level.product_id, level))
            .collect();

        Ok(ConsistencyReport::scan(
            tenant_id,
            products.iter().map(|p| (p, levels.get(&p.id))),
            Utc::now(),
        ))
    }

    /// Export every entry matching `filters` (pagination is ignored), enriched
    /// with current catalog data.
    #[instrument(skip(self, filters), fields(tenant_id = %tenant_id), err)]
    pub async fn generate_report(
        &self,
        tenant_id: TenantId,
        filters: &AuditQuery,
    ) -> ServiceResult<AuditReport> {
        filters.date_range.validate()?;
        let entries = self
            .stores
            .audit
            .entries(tenant_id, filters)
            .await
            .or_system("list_audit")?;

        let mut ids: Vec<ProductId> = entries.iter().map(|e| e.record_id).collect();
        ids.sort();
        ids.dedup();
        let products = self
            .stores
            .catalog
            .get_products(tenant_id, &ids)
            .await
            .or_system("get_products")?;

        Ok(AuditReport::build(
            tenant_id,
            entries,
            |id| products.get(&id).cloned(),
            Utc::now(),
        ))
    }
}


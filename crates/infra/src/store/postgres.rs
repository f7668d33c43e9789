//! Postgres-backed stores.
//!
//! Stock and availability live in two tables keyed 1:1 by `(tenant_id,
//! product_id)`; the version column sits on `stock_records` and guards both.
//! Every statement carries `tenant_id` in its WHERE clause.

use std::collections::HashMap;
use std::str::FromStr;

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockwise_core::{ExpectedVersion, ProductId, TenantId, UserId};
use stockwise_inventory::{
    Alert, AlertChannel, AlertConfig, AlertPriority, AlertType, AuditEntry, AuditOperation,
    AuditPage, AuditQuery, AuditTable, MovementType, ProductInfo, QuantityChange, Reference,
    ReferenceType, StockLevel,
};

use super::{
    AlertConfigStore, AlertHistory, AuditStore, InventoryStore, InventoryTx, ProductCatalog,
    StoreError, map_sqlx_error,
};

/// Postgres implementation of every store trait.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn expected_param(expected: ExpectedVersion) -> Option<i64> {
    match expected {
        ExpectedVersion::Any => None,
        ExpectedVersion::Exact(v) => Some(v as i64),
    }
}

fn corrupt(operation: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{operation}: {err}"))
}

fn level_from_row(row: &PgRow) -> Result<StockLevel, StoreError> {
    let product_id: Uuid = row.try_get("product_id").map_err(|e| corrupt("level", e))?;
    let quantity: i64 = row.try_get("quantity").map_err(|e| corrupt("level", e))?;
    let available: i64 = row.try_get("available").map_err(|e| corrupt("level", e))?;
    let version: i64 = row.try_get("version").map_err(|e| corrupt("level", e))?;
    Ok(StockLevel {
        product_id: ProductId::from_uuid(product_id),
        quantity,
        available,
        version: version as u64,
    })
}

fn product_from_row(row: &PgRow) -> Result<ProductInfo, StoreError> {
    let price: Option<i64> = row.try_get("price").map_err(|e| corrupt("product", e))?;
    Ok(ProductInfo {
        id: ProductId::from_uuid(row.try_get("product_id").map_err(|e| corrupt("product", e))?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id").map_err(|e| corrupt("product", e))?),
        name: row.try_get("name").map_err(|e| corrupt("product", e))?,
        is_service: row.try_get("is_service").map_err(|e| corrupt("product", e))?,
        category: row.try_get("category").map_err(|e| corrupt("product", e))?,
        price: price.map(|p| p.max(0) as u64),
    })
}

fn audit_from_row(row: &PgRow) -> Result<AuditEntry, StoreError> {
    let get_err = |e: sqlx::Error| corrupt("audit entry", e);

    let table: String = row.try_get("table_name").map_err(get_err)?;
    let operation: String = row.try_get("operation").map_err(get_err)?;
    let movement_type: Option<String> = row.try_get("movement_type").map_err(get_err)?;
    let movement_type = movement_type
        .map(|t| MovementType::from_str(&t))
        .transpose()
        .map_err(|e| corrupt("audit entry", e))?;
    let reference_type: Option<String> = row.try_get("reference_type").map_err(get_err)?;
    let reference_id: Option<String> = row.try_get("reference_id").map_err(get_err)?;
    let reference = match (reference_type, reference_id) {
        (Some(t), Some(id)) => Some(Reference::new(
            ReferenceType::from_str(&t).map_err(|e| corrupt("audit entry", e))?,
            id,
        )),
        _ => None,
    };
    let available_before: Option<i64> = row.try_get("available_before").map_err(get_err)?;
    let available_after: Option<i64> = row.try_get("available_after").map_err(get_err)?;
    let actor_id: Option<Uuid> = row.try_get("actor_id").map_err(get_err)?;

    Ok(AuditEntry {
        id: row.try_get("id").map_err(get_err)?,
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id").map_err(get_err)?),
        table: AuditTable::from_table_name(&table).map_err(|e| corrupt("audit entry", e))?,
        record_id: ProductId::from_uuid(row.try_get("record_id").map_err(get_err)?),
        actor_id: actor_id.map(UserId::from_uuid),
        operation: AuditOperation::from_parts(&operation, movement_type)
            .map_err(|e| corrupt("audit entry", e))?,
        quantity: QuantityChange::new(
            row.try_get("quantity_before").map_err(get_err)?,
            row.try_get("quantity_after").map_err(get_err)?,
        ),
        available: match (available_before, available_after) {
            (Some(before), Some(after)) => Some(QuantityChange::new(before, after)),
            _ => None,
        },
        reason: row.try_get("reason").map_err(get_err)?,
        reference,
        product_name: row.try_get("product_name").map_err(get_err)?,
        recorded_at: row.try_get("recorded_at").map_err(get_err)?,
    })
}

fn alert_from_row(row: &PgRow) -> Result<Alert, StoreError> {
    let get_err = |e: sqlx::Error| corrupt("alert", e);
    let alert_type: String = row.try_get("alert_type").map_err(get_err)?;
    let priority: String = row.try_get("priority").map_err(get_err)?;
    let price: Option<i64> = row.try_get("price").map_err(get_err)?;
    Ok(Alert {
        product_id: ProductId::from_uuid(row.try_get("product_id").map_err(get_err)?),
        product_name: row.try_get("product_name").map_err(get_err)?,
        current_qty: row.try_get("current_qty").map_err(get_err)?,
        available: row.try_get("available").map_err(get_err)?,
        threshold: row.try_get("threshold").map_err(get_err)?,
        alert_type: AlertType::from_str(&alert_type).map_err(|e| corrupt("alert", e))?,
        priority: AlertPriority::from_str(&priority).map_err(|e| corrupt("alert", e))?,
        category: row.try_get("category").map_err(get_err)?,
        price: price.map(|p| p.max(0) as u64),
        detected_at: row.try_get("detected_at").map_err(get_err)?,
    })
}

/// Bind `tenant_id` and the optional filters as `$1..=$7`.
fn bind_audit_filters<'q>(
    query: Query<'q, Postgres, PgArguments>,
    tenant_id: TenantId,
    filter: &AuditQuery,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(*tenant_id.as_uuid())
        .bind(filter.date_range.from)
        .bind(filter.date_range.to)
        .bind(filter.product_id.map(|p| *p.as_uuid()))
        .bind(filter.actor_id.map(|a| *a.as_uuid()))
        .bind(filter.movement_type.map(|t| t.as_str()))
        .bind(filter.reference_type.map(|t| t.as_str()))
}

const AUDIT_FILTER: &str = r#"
    WHERE tenant_id = $1
        AND ($2::timestamptz IS NULL OR recorded_at >= $2)
        AND ($3::timestamptz IS NULL OR recorded_at <= $3)
        AND ($4::uuid IS NULL OR record_id = $4)
        AND ($5::uuid IS NULL OR actor_id = $5)
        AND ($6::text IS NULL OR movement_type = $6)
        AND ($7::text IS NULL OR reference_type = $7)
"#;

const AUDIT_COLUMNS: &str = r#"
    SELECT
        id, tenant_id, table_name, record_id, actor_id, operation, movement_type,
        quantity_before, quantity_after, available_before, available_after,
        reason, reference_type, reference_id, product_name, recorded_at
    FROM audit_entries
"#;

#[async_trait::async_trait]
impl InventoryStore for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn InventoryTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTx { tenant_id, tx }))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn get_level(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<StockLevel>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT s.product_id, s.quantity, s.version, a.available
            FROM stock_records s
            JOIN availability_records a
                ON a.tenant_id = s.tenant_id AND a.product_id = s.product_id
            WHERE s.tenant_id = $1 AND s.product_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_level", e))?;

        row.as_ref().map(level_from_row).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_levels(&self, tenant_id: TenantId) -> Result<Vec<StockLevel>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT s.product_id, s.quantity, s.version, a.available
            FROM stock_records s
            JOIN availability_records a
                ON a.tenant_id = s.tenant_id AND a.product_id = s.product_id
            WHERE s.tenant_id = $1
            ORDER BY s.product_id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_levels", e))?;

        rows.iter().map(level_from_row).collect()
    }
}

struct PostgresTx {
    tenant_id: TenantId,
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl InventoryTx for PostgresTx {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id, count = product_ids.len()), err)]
    async fn lock_levels(
        &mut self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, StockLevel>, StoreError> {
        let mut ids: Vec<Uuid> = product_ids.iter().map(|p| *p.as_uuid()).collect();
        ids.sort();
        ids.dedup();

        // ORDER BY makes the lock acquisition order deterministic across
        // concurrent transactions.
        let rows = sqlx::query(
            r#"
            SELECT s.product_id, s.quantity, s.version, a.available
            FROM stock_records s
            JOIN availability_records a
                ON a.tenant_id = s.tenant_id AND a.product_id = s.product_id
            WHERE s.tenant_id = $1 AND s.product_id = ANY($2)
            ORDER BY s.product_id
            FOR UPDATE OF s, a
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_levels", e))?;

        rows.iter()
            .map(|row| level_from_row(row).map(|level| (level.product_id, level)))
            .collect()
    }

    #[instrument(skip(self, level), fields(tenant_id = %self.tenant_id, product_id = %level.product_id), err)]
    async fn insert_level(&mut self, level: &StockLevel) -> Result<StockLevel, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_records (tenant_id, product_id, quantity, version)
            VALUES ($1, $2, $3, 1)
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(level.product_id.as_uuid())
        .bind(level.quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_stock_record", e))?;

        sqlx::query(
            r#"
            INSERT INTO availability_records (tenant_id, product_id, available)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(level.product_id.as_uuid())
        .bind(level.available)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_availability_record", e))?;

        Ok(StockLevel { version: 1, ..*level })
    }

    #[instrument(
        skip(self, level),
        fields(tenant_id = %self.tenant_id, product_id = %level.product_id, expected = ?expected),
        err
    )]
    async fn save_level(
        &mut self,
        level: &StockLevel,
        expected: ExpectedVersion,
    ) -> Result<StockLevel, StoreError> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE stock_records
            SET quantity = $3, version = version + 1, updated_at = NOW()
            WHERE tenant_id = $1 AND product_id = $2
                AND ($4::bigint IS NULL OR version = $4)
            RETURNING version
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(level.product_id.as_uuid())
        .bind(level.quantity)
        .bind(expected_param(expected))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_stock_record", e))?;

        let Some(version) = version else {
            return Err(StoreError::Concurrency(format!(
                "stock record {} changed or vanished (expected {expected:?})",
                level.product_id
            )));
        };

        sqlx::query(
            r#"
            UPDATE availability_records
            SET available = $3, updated_at = NOW()
            WHERE tenant_id = $1 AND product_id = $2
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(level.product_id.as_uuid())
        .bind(level.available)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_availability_record", e))?;

        Ok(StockLevel {
            version: version as u64,
            ..*level
        })
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id, product_id = %product_id), err)]
    async fn delete_level(
        &mut self,
        product_id: ProductId,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        // availability_records goes with it (ON DELETE CASCADE).
        let deleted = sqlx::query(
            r#"
            DELETE FROM stock_records
            WHERE tenant_id = $1 AND product_id = $2
                AND ($3::bigint IS NULL OR version = $3)
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(expected_param(expected))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("delete_stock_record", e))?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::Concurrency(format!(
                "stock record {product_id} changed or vanished (expected {expected:?})"
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, entry), fields(tenant_id = %self.tenant_id, entry_id = %entry.id), err)]
    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), StoreError> {
        if entry.tenant_id != self.tenant_id {
            return Err(StoreError::Backend(format!(
                "audit entry for tenant {} in transaction of tenant {}",
                entry.tenant_id, self.tenant_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO audit_entries (
                id, tenant_id, table_name, record_id, actor_id, operation, movement_type,
                quantity_before, quantity_after, available_before, available_after,
                reason, reference_type, reference_id, product_name, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(entry.id)
        .bind(entry.tenant_id.as_uuid())
        .bind(entry.table.table_name())
        .bind(entry.record_id.as_uuid())
        .bind(entry.actor_id.map(|a| *a.as_uuid()))
        .bind(entry.operation.label())
        .bind(entry.operation.movement_type().map(|t| t.as_str()))
        .bind(entry.quantity.before)
        .bind(entry.quantity.after)
        .bind(entry.available.map(|a| a.before))
        .bind(entry.available.map(|a| a.after))
        .bind(&entry.reason)
        .bind(entry.reference_type().map(|t| t.as_str()))
        .bind(entry.reference.as_ref().map(|r| r.id.as_str()))
        .bind(&entry.product_name)
        .bind(entry.recorded_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_audit_entry", e))?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait::async_trait]
impl AuditStore for PostgresStore {
    #[instrument(skip(self, query), fields(tenant_id = %tenant_id, page = query.page), err)]
    async fn query(&self, tenant_id: TenantId, query: &AuditQuery) -> Result<AuditPage, StoreError> {
        let count_sql = format!("SELECT COUNT(*) FROM audit_entries {AUDIT_FILTER}");
        let total: i64 = bind_audit_filters(sqlx::query(&count_sql), tenant_id, query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_audit_entries", e))?
            .try_get(0)
            .map_err(|e| corrupt("count_audit_entries", e))?;

        let page_sql = format!(
            "{AUDIT_COLUMNS} {AUDIT_FILTER} ORDER BY recorded_at DESC, id DESC LIMIT $8 OFFSET $9"
        );
        let rows = bind_audit_filters(sqlx::query(&page_sql), tenant_id, query)
            .bind(i64::from(query.limit))
            .bind(query.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("query_audit_entries", e))?;

        Ok(AuditPage {
            entries: rows.iter().map(audit_from_row).collect::<Result<_, _>>()?,
            total: total.max(0) as u64,
            page: query.page,
            limit: query.limit,
        })
    }

    #[instrument(skip(self, query), fields(tenant_id = %tenant_id), err)]
    async fn entries(
        &self,
        tenant_id: TenantId,
        query: &AuditQuery,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let sql = format!("{AUDIT_COLUMNS} {AUDIT_FILTER} ORDER BY recorded_at DESC, id DESC");
        let rows = bind_audit_filters(sqlx::query(&sql), tenant_id, query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_audit_entries", e))?;
        rows.iter().map(audit_from_row).collect()
    }
}

#[async_trait::async_trait]
impl ProductCatalog for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn get_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<ProductInfo>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, product_id, name, is_service, category, price
            FROM products
            WHERE tenant_id = $1 AND product_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self, product_ids), fields(tenant_id = %tenant_id, count = product_ids.len()), err)]
    async fn get_products(
        &self,
        tenant_id: TenantId,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductInfo>, StoreError> {
        let ids: Vec<Uuid> = product_ids.iter().map(|p| *p.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, product_id, name, is_service, category, price
            FROM products
            WHERE tenant_id = $1 AND product_id = ANY($2)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_products", e))?;

        rows.iter()
            .map(|row| product_from_row(row).map(|p| (p.id, p)))
            .collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_physical(&self, tenant_id: TenantId) -> Result<Vec<ProductInfo>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, product_id, name, is_service, category, price
            FROM products
            WHERE tenant_id = $1 AND NOT is_service
            ORDER BY product_id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_physical_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self, product), fields(tenant_id = %product.tenant_id, product_id = %product.id), err)]
    async fn upsert_product(&self, product: &ProductInfo) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (tenant_id, product_id, name, is_service, category, price)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id, product_id)
            DO UPDATE SET
                name = EXCLUDED.name,
                is_service = EXCLUDED.is_service,
                category = EXCLUDED.category,
                price = EXCLUDED.price,
                updated_at = NOW()
            "#,
        )
        .bind(product.tenant_id.as_uuid())
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.is_service)
        .bind(product.category.as_deref())
        .bind(product.price.map(|p| p as i64))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_product", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AlertConfigStore for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get_config(&self, tenant_id: TenantId) -> Result<Option<AlertConfig>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT stock_minimo, stock_critico, enabled, channels, frequency_minutes, recipient_ids
            FROM alert_configs
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_alert_config", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let get_err = |e: sqlx::Error| corrupt("alert config", e);
        let channels: Json<Vec<AlertChannel>> = row.try_get("channels").map_err(get_err)?;
        let frequency: i32 = row.try_get("frequency_minutes").map_err(get_err)?;
        let recipients: Vec<Uuid> = row.try_get("recipient_ids").map_err(get_err)?;
        Ok(Some(AlertConfig {
            stock_minimo: row.try_get("stock_minimo").map_err(get_err)?,
            stock_critico: row.try_get("stock_critico").map_err(get_err)?,
            enabled: row.try_get("enabled").map_err(get_err)?,
            channels: channels.0,
            frequency_minutes: frequency.max(1) as u32,
            recipient_ids: recipients.into_iter().map(UserId::from_uuid).collect(),
        }))
    }

    #[instrument(skip(self, config), fields(tenant_id = %tenant_id), err)]
    async fn put_config(&self, tenant_id: TenantId, config: &AlertConfig) -> Result<(), StoreError> {
        let recipients: Vec<Uuid> = config.recipient_ids.iter().map(|u| *u.as_uuid()).collect();
        sqlx::query(
            r#"
            INSERT INTO alert_configs (
                tenant_id, stock_minimo, stock_critico, enabled, channels,
                frequency_minutes, recipient_ids
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tenant_id)
            DO UPDATE SET
                stock_minimo = EXCLUDED.stock_minimo,
                stock_critico = EXCLUDED.stock_critico,
                enabled = EXCLUDED.enabled,
                channels = EXCLUDED.channels,
                frequency_minutes = EXCLUDED.frequency_minutes,
                recipient_ids = EXCLUDED.recipient_ids,
                updated_at = NOW()
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(config.stock_minimo)
        .bind(config.stock_critico)
        .bind(config.enabled)
        .bind(Json(&config.channels))
        .bind(i32::try_from(config.frequency_minutes).unwrap_or(i32::MAX))
        .bind(&recipients)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("put_alert_config", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn configured_tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT tenant_id FROM alert_configs ORDER BY tenant_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("configured_tenants", e))?;
        Ok(ids.into_iter().map(TenantId::from_uuid).collect())
    }
}

#[async_trait::async_trait]
impl AlertHistory for PostgresStore {
    #[instrument(skip(self, alert), fields(tenant_id = %tenant_id, product_id = %alert.product_id), err)]
    async fn record_alert(&self, tenant_id: TenantId, alert: &Alert) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO alert_history (
                id, tenant_id, product_id, product_name, alert_type, priority,
                current_qty, available, threshold, category, price, detected_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(tenant_id.as_uuid())
        .bind(alert.product_id.as_uuid())
        .bind(&alert.product_name)
        .bind(alert.alert_type.as_str())
        .bind(alert.priority.as_str())
        .bind(alert.current_qty)
        .bind(alert.available)
        .bind(alert.threshold)
        .bind(alert.category.as_deref())
        .bind(alert.price.map(|p| p as i64))
        .bind(alert.detected_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_alert", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn recent_alerts(&self, tenant_id: TenantId, limit: u32) -> Result<Vec<Alert>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, product_name, alert_type, priority, current_qty, available,
                   threshold, category, price, detected_at
            FROM alert_history
            WHERE tenant_id = $1
            ORDER BY detected_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("recent_alerts", e))?;

        rows.iter().map(alert_from_row).collect()
    }
}

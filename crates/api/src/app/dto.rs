use chrono::{DateTime, Utc};
use serde::Deserialize;

use stockwise_core::{ProductId, TenantId, UserId};
use stockwise_inventory::{
    AuditQuery, DateRange, Movement, MovementType, ProductInfo, Reference, ReferenceType, StockLevel,
    SyncLine, SyncRequest,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterProductRequest {
    pub name: String,
    pub category: Option<String>,
    pub price: Option<u64>,
}

impl RegisterProductRequest {
    pub fn into_product(self, tenant_id: TenantId, product_id: ProductId) -> ProductInfo {
        let mut product = ProductInfo::physical(tenant_id, product_id, self.name);
        if let Some(category) = self.category {
            product = product.with_category(category);
        }
        if let Some(price) = self.price {
            product = product.with_price(price);
        }
        product
    }
}

#[derive(Debug, Deserialize)]
pub struct ReferenceRequest {
    pub reference_type: ReferenceType,
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reason: String,
    pub reference: Option<ReferenceRequest>,
}

impl MovementRequest {
    pub fn into_movement(self, product_id: ProductId, actor_id: Option<UserId>) -> Movement {
        let mut movement = Movement::new(product_id, self.quantity, self.movement_type, self.reason);
        if let Some(actor_id) = actor_id {
            movement = movement.by(actor_id);
        }
        if let Some(r) = self.reference {
            movement = movement.referencing(Reference::new(r.reference_type, r.id));
        }
        movement
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub available: i64,
    pub reason: Option<String>,
}

/// Body of the three sync routes; tenant and actor come from the request context.
#[derive(Debug, Deserialize)]
pub struct SyncRequestBody<Op> {
    pub event_id: String,
    pub operation: Op,
    pub items: Vec<SyncLine>,
}

impl<Op> SyncRequestBody<Op> {
    pub fn into_request(self, tenant_id: TenantId, actor_id: UserId) -> SyncRequest<Op> {
        SyncRequest {
            event_id: self.event_id,
            tenant_id,
            actor_id,
            items: self.items,
            operation: self.operation,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl RangeParams {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.from, self.to)
    }
}

/// Flat query-string form of [`AuditQuery`].
#[derive(Debug, Default, Deserialize)]
pub struct AuditParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub product_id: Option<ProductId>,
    pub actor_id: Option<UserId>,
    pub movement_type: Option<MovementType>,
    pub reference_type: Option<ReferenceType>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl AuditParams {
    pub fn into_query(self) -> AuditQuery {
        let defaults = AuditQuery::default();
        AuditQuery {
            date_range: DateRange::new(self.from, self.to),
            product_id: self.product_id,
            actor_id: self.actor_id,
            movement_type: self.movement_type,
            reference_type: self.reference_type,
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
        }
    }
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn level_to_json(level: StockLevel) -> serde_json::Value {
    serde_json::json!({
        "product_id": level.product_id,
        "quantity": level.quantity,
        "available": level.available,
        "version": level.version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_params_fill_paging_defaults() {
        let query = AuditParams {
            movement_type: Some(MovementType::Salida),
            ..AuditParams::default()
        }
        .into_query();
        assert_eq!(query.page, AuditQuery::default().page);
        assert_eq!(query.limit, AuditQuery::default().limit);
        assert_eq!(query.movement_type, Some(MovementType::Salida));
    }

    #[test]
    fn sync_body_uses_wire_operation_names() {
        let body: SyncRequestBody<stockwise_inventory::SaleOperation> = serde_json::from_value(
            serde_json::json!({
                "event_id": "V-1",
                "operation": "CONFIRMAR",
                "items": [{ "product_id": ProductId::new(), "quantity": 2 }]
            }),
        )
        .unwrap();
        assert_eq!(body.operation, stockwise_inventory::SaleOperation::Confirmar);
        assert_eq!(body.items[0].price, None);
    }
}

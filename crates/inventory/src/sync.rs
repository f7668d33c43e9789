//! Translation of sales, purchase and quotation events into inventory changes.
//!
//! Planning is two-phase and pure: every line of an event is evaluated against a
//! working copy of the current levels (so repeated lines for one product
//! compound), and the resulting writes are only usable when *every* line
//! succeeded. A rejected event changes nothing.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwise_core::{ErrorKind, ProductId, TenantId, UserId};

use crate::audit::{AuditEntry, AuditOperation};
use crate::error::{InventoryError, InventoryResult};
use crate::level::StockLevel;
use crate::movement::{Movement, MovementType, Reference, ReferenceType};
use crate::product::ProductInfo;
use crate::validation::{self, MAX_REASON_LEN};

/// Marker attached to lines skipped because the product is a service.
pub const SERVICE_MARKER: &str = "SERVICIO";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    Sale,
    Purchase,
    Reservation,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleOperation {
    Confirmar,
    Cancelar,
    Devolver,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOperation {
    Recibir,
    Cancelar,
    Devolver,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationOperation {
    Reservar,
    Liberar,
}

/// What one line does to a level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LineEffect {
    /// Stock and availability up (`Entrada`).
    Increase,
    /// Stock down, must be sufficient; availability down, floored at zero (`Salida`).
    Decrease,
    /// Availability down, must be sufficient. Stock untouched.
    Reserve,
    /// Availability up, capped at stock. Stock untouched.
    Release,
}

/// An operation coming from one of the business modules.
pub trait SyncOperation: Copy + core::fmt::Debug + Send + Sync {
    const KIND: SyncKind;

    fn effect(&self) -> LineEffect;

    fn reference_type(&self) -> ReferenceType;

    /// Human label used in audit reasons.
    fn label(&self) -> &'static str;
}

impl SyncOperation for SaleOperation {
    const KIND: SyncKind = SyncKind::Sale;

    fn effect(&self) -> LineEffect {
        match self {
            SaleOperation::Confirmar => LineEffect::Decrease,
            SaleOperation::Cancelar | SaleOperation::Devolver => LineEffect::Increase,
        }
    }

    fn reference_type(&self) -> ReferenceType {
        match self {
            SaleOperation::Devolver => ReferenceType::Devolucion,
            _ => ReferenceType::Venta,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SaleOperation::Confirmar => "Venta confirmada",
            SaleOperation::Cancelar => "Venta cancelada",
            SaleOperation::Devolver => "Devolución de venta",
        }
    }
}

impl SyncOperation for PurchaseOperation {
    const KIND: SyncKind = SyncKind::Purchase;

    fn effect(&self) -> LineEffect {
        match self {
            PurchaseOperation::Recibir => LineEffect::Increase,
            PurchaseOperation::Cancelar | PurchaseOperation::Devolver => LineEffect::Decrease,
        }
    }

    fn reference_type(&self) -> ReferenceType {
        match self {
            PurchaseOperation::Devolver => ReferenceType::Devolucion,
            _ => ReferenceType::Compra,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            PurchaseOperation::Recibir => "Compra recibida",
            PurchaseOperation::Cancelar => "Compra cancelada",
            PurchaseOperation::Devolver => "Devolución a proveedor",
        }
    }
}

impl SyncOperation for ReservationOperation {
    const KIND: SyncKind = SyncKind::Reservation;

    fn effect(&self) -> LineEffect {
        match self {
            ReservationOperation::Reservar => LineEffect::Reserve,
            ReservationOperation::Liberar => LineEffect::Release,
        }
    }

    fn reference_type(&self) -> ReferenceType {
        ReferenceType::Cotizacion
    }

    fn label(&self) -> &'static str {
        match self {
            ReservationOperation::Reservar => "Reserva por cotización",
            ReservationOperation::Liberar => "Liberación de cotización",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLine {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Unit price in smallest currency unit; informational only.
    #[serde(default)]
    pub price: Option<u64>,
}

/// One business event (a sale, a purchase or a quotation) to mirror in inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest<Op> {
    /// Id of the originating document (venta, compra or cotización).
    pub event_id: String,
    pub tenant_id: TenantId,
    pub actor_id: UserId,
    pub items: Vec<SyncLine>,
    pub operation: Op,
}

impl<Op: SyncOperation> SyncRequest<Op> {
    pub fn validate(&self) -> InventoryResult<()> {
        if self.items.is_empty() {
            return Err(InventoryError::EmptySync);
        }
        if self.event_id.trim().is_empty() {
            return Err(InventoryError::InvalidQuery("event id cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn reference(&self) -> Reference {
        Reference::new(self.operation.reference_type(), self.event_id.trim())
    }

    /// Audit reason, e.g. `Venta confirmada V-0012`, cut to the allowed length.
    pub fn reason(&self) -> String {
        format!("{} {}", self.operation.label(), self.event_id.trim())
            .chars()
            .take(MAX_REASON_LEN)
            .collect()
    }

    /// Distinct product ids in ascending order (the lock order).
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.items.iter().map(|l| l.product_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Per-line lifecycle: `Pending` moves to exactly one terminal state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,
    Applied,
    Failed,
    /// Service product; no inventory effect.
    Skipped,
    /// Valid on its own but not written because another line of the event failed.
    NotApplied,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ItemStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub line: usize,
    pub product_id: ProductId,
    pub quantity: i64,
    pub status: ItemStatus,
    pub stock_before: Option<i64>,
    pub stock_after: Option<i64>,
    pub available_before: Option<i64>,
    pub available_after: Option<i64>,
    pub marker: Option<String>,
}

impl ItemDetail {
    fn pending(line: usize, item: &SyncLine) -> Self {
        Self {
            line,
            product_id: item.product_id,
            quantity: item.quantity,
            status: ItemStatus::Pending,
            stock_before: None,
            stock_after: None,
            available_before: None,
            available_after: None,
            marker: None,
        }
    }

    /// Move out of `Pending`. Terminal states are final; returns whether the
    /// transition happened.
    fn transition(&mut self, to: ItemStatus) -> bool {
        if self.status.is_terminal() || !to.is_terminal() {
            return false;
        }
        self.status = to;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItemError {
    pub line: usize,
    pub product_id: ProductId,
    pub kind: ErrorKind,
    pub message: String,
}

impl SyncItemError {
    fn new(line: usize, product_id: ProductId, err: &InventoryError) -> Self {
        Self {
            line,
            product_id,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Aggregated answer returned to the calling module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub event_id: String,
    pub kind: SyncKind,
    /// True only if every line is `Applied` or `Skipped`.
    pub success: bool,
    pub products_affected: usize,
    pub movements_recorded: usize,
    pub errors: Vec<SyncItemError>,
    pub details: Vec<ItemDetail>,
}

impl SyncResult {
    pub fn first_error_kind(&self) -> Option<ErrorKind> {
        self.errors.first().map(|e| e.kind)
    }
}

/// Output of phase one.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPlan {
    pub event_id: String,
    pub kind: SyncKind,
    /// Final level per touched product. `version` is still the loaded version,
    /// i.e. the compare-and-swap expectation.
    pub writes: Vec<StockLevel>,
    pub entries: Vec<AuditEntry>,
    pub details: Vec<ItemDetail>,
    pub errors: Vec<SyncItemError>,
}

impl SyncPlan {
    /// All lines planned without error; `writes`/`entries` may be committed.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Build the caller-facing result. A dirty plan reports every non-failed
    /// line as `NotApplied`, since nothing of it is written.
    pub fn into_result(mut self) -> SyncResult {
        let success = self.errors.is_empty();
        if !success {
            for detail in &mut self.details {
                if detail.status == ItemStatus::Applied {
                    detail.status = ItemStatus::NotApplied;
                    detail.stock_after = detail.stock_before;
                    detail.available_after = detail.available_before;
                }
            }
        }
        let (products_affected, movements_recorded) = if success {
            (self.writes.len(), self.entries.len())
        } else {
            (0, 0)
        };
        SyncResult {
            event_id: self.event_id,
            kind: self.kind,
            success,
            products_affected,
            movements_recorded,
            errors: self.errors,
            details: self.details,
        }
    }
}

/// Phase one: evaluate every line of `request` without writing anything.
///
/// `products` and `levels` hold whatever the caller could load (and lock) for
/// `request.product_ids()`; absent entries become per-line errors.
pub fn plan<Op: SyncOperation>(
    request: &SyncRequest<Op>,
    products: &HashMap<ProductId, ProductInfo>,
    levels: &HashMap<ProductId, StockLevel>,
    at: DateTime<Utc>,
) -> SyncPlan {
    let reason = request.reason();
    let reference = request.reference();
    let effect = request.operation.effect();

    let mut working: BTreeMap<ProductId, StockLevel> = BTreeMap::new();
    let mut entries = Vec::new();
    let mut details = Vec::with_capacity(request.items.len());
    let mut errors = Vec::new();

    for (line, item) in request.items.iter().enumerate() {
        let mut detail = ItemDetail::pending(line, item);

        let product = match products.get(&item.product_id) {
            Some(p) if p.tenant_id == request.tenant_id => p,
            _ => {
                let err = InventoryError::ProductNotFound(item.product_id);
                errors.push(SyncItemError::new(line, item.product_id, &err));
                detail.transition(ItemStatus::Failed);
                details.push(detail);
                continue;
            }
        };

        if product.is_service {
            detail.marker = Some(SERVICE_MARKER.to_string());
            detail.transition(ItemStatus::Skipped);
            details.push(detail);
            continue;
        }

        let current = match working
            .get(&item.product_id)
            .or_else(|| levels.get(&item.product_id))
        {
            Some(level) => *level,
            None => {
                let err = InventoryError::StockRecordNotFound(item.product_id);
                errors.push(SyncItemError::new(line, item.product_id, &err));
                detail.transition(ItemStatus::Failed);
                details.push(detail);
                continue;
            }
        };

        detail.stock_before = Some(current.quantity);
        detail.available_before = Some(current.available);

        let applied = apply_line(effect, &current, item, &reason, &reference, request, product, at);
        match applied {
            Ok((next, entry)) => {
                detail.stock_after = Some(next.quantity);
                detail.available_after = Some(next.available);
                detail.transition(ItemStatus::Applied);
                working.insert(item.product_id, next);
                entries.push(entry);
            }
            Err(err) => {
                errors.push(SyncItemError::new(line, item.product_id, &err));
                detail.transition(ItemStatus::Failed);
            }
        }
        details.push(detail);
    }

    SyncPlan {
        event_id: request.event_id.clone(),
        kind: Op::KIND,
        writes: working.into_values().collect(),
        entries,
        details,
        errors,
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_line<Op: SyncOperation>(
    effect: LineEffect,
    current: &StockLevel,
    item: &SyncLine,
    reason: &str,
    reference: &Reference,
    request: &SyncRequest<Op>,
    product: &ProductInfo,
    at: DateTime<Utc>,
) -> InventoryResult<(StockLevel, AuditEntry)> {
    validation::validate_quantity(item.quantity)?;

    let (next, entry) = match effect {
        LineEffect::Increase | LineEffect::Decrease => {
            let movement_type = if effect == LineEffect::Increase {
                MovementType::Entrada
            } else {
                MovementType::Salida
            };
            let movement = Movement::new(item.product_id, item.quantity, movement_type, reason)
                .by(request.actor_id)
                .referencing(reference.clone());
            let (next, outcome) = current.apply_movement(&movement)?;
            let entry = AuditEntry::movement(request.tenant_id, &product.name, &movement, &outcome, at);
            (next, entry)
        }
        LineEffect::Reserve | LineEffect::Release => {
            let (next, operation) = if effect == LineEffect::Reserve {
                (current.reserve(item.quantity)?, AuditOperation::Reservation)
            } else {
                (current.release(item.quantity)?, AuditOperation::Release)
            };
            let entry = AuditEntry::availability(
                request.tenant_id,
                &product.name,
                operation,
                current,
                &next,
                reason,
                Some(request.actor_id),
                Some(reference.clone()),
                at,
            );
            (next, entry)
        }
    };
    // A stored row that already breaks the invariant must not be written back.
    next.check_invariants()?;
    Ok((next, entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditTable;

    struct Fixture {
        tenant: TenantId,
        products: HashMap<ProductId, ProductInfo>,
        levels: HashMap<ProductId, StockLevel>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tenant: TenantId::new(),
                products: HashMap::new(),
                levels: HashMap::new(),
            }
        }

        fn physical(&mut self, name: &str, quantity: i64, available: i64) -> ProductId {
            let id = ProductId::new();
            self.products
                .insert(id, ProductInfo::physical(self.tenant, id, name));
            self.levels.insert(
                id,
                StockLevel {
                    quantity,
                    available,
                    version: 3,
                    ..StockLevel::new(id)
                },
            );
            id
        }

        fn service(&mut self, name: &str) -> ProductId {
            let id = ProductId::new();
            self.products
                .insert(id, ProductInfo::service(self.tenant, id, name));
            id
        }

        fn request<Op>(&self, operation: Op, items: Vec<(ProductId, i64)>) -> SyncRequest<Op> {
            SyncRequest {
                event_id: "EV-001".to_string(),
                tenant_id: self.tenant,
                actor_id: UserId::new(),
                items: items
                    .into_iter()
                    .map(|(product_id, quantity)| SyncLine {
                        product_id,
                        quantity,
                        price: None,
                    })
                    .collect(),
                operation,
            }
        }

        fn plan<Op: SyncOperation>(&self, req: &SyncRequest<Op>) -> SyncPlan {
            plan(req, &self.products, &self.levels, Utc::now())
        }
    }

    #[test]
    fn confirmed_sale_decrements_stock_and_availability() {
        let mut fx = Fixture::new();
        let p = fx.physical("Taladro", 10, 10);
        let plan = fx.plan(&fx.request(SaleOperation::Confirmar, vec![(p, 5)]));

        assert!(plan.is_clean());
        assert_eq!(plan.writes.len(), 1);
        assert_eq!((plan.writes[0].quantity, plan.writes[0].available), (5, 5));
        assert_eq!(plan.writes[0].version, 3);
        assert_eq!(plan.entries.len(), 1);
        let entry = &plan.entries[0];
        assert_eq!(entry.operation, AuditOperation::Movement(MovementType::Salida));
        assert_eq!(entry.reference_type(), Some(ReferenceType::Venta));
        assert_eq!(entry.reason, "Venta confirmada EV-001");
    }

    #[test]
    fn cancelled_sale_restores_availability_up_to_stock() {
        let mut fx = Fixture::new();
        let p = fx.physical("Taladro", 5, 5);
        let plan = fx.plan(&fx.request(SaleOperation::Cancelar, vec![(p, 5)]));
        assert_eq!((plan.writes[0].quantity, plan.writes[0].available), (10, 10));
    }

    #[test]
    fn services_are_skipped_with_marker() {
        let mut fx = Fixture::new();
        let svc = fx.service("Instalación");
        let p = fx.physical("Taladro", 10, 10);
        let result = fx
            .plan(&fx.request(SaleOperation::Confirmar, vec![(svc, 1), (p, 1)]))
            .into_result();

        assert!(result.success);
        assert_eq!(result.details[0].status, ItemStatus::Skipped);
        assert_eq!(result.details[0].marker.as_deref(), Some(SERVICE_MARKER));
        assert_eq!(result.products_affected, 1);
        assert_eq!(result.movements_recorded, 1);
    }

    #[test]
    fn one_failing_line_rejects_the_whole_event() {
        let mut fx = Fixture::new();
        let ok = fx.physical("Taladro", 10, 10);
        let short = fx.physical("Broca", 1, 1);
        let plan = fx.plan(&fx.request(PurchaseOperation::Devolver, vec![(ok, 2), (short, 3)]));

        assert!(!plan.is_clean());
        let result = plan.into_result();
        assert!(!result.success);
        assert_eq!(result.products_affected, 0);
        assert_eq!(result.movements_recorded, 0);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].line, 1);
        assert_eq!(result.errors[0].kind, ErrorKind::Conflict);
        assert_eq!(result.details[0].status, ItemStatus::NotApplied);
        assert_eq!(result.details[0].stock_after, Some(10));
        assert_eq!(result.details[1].status, ItemStatus::Failed);
    }

    #[test]
    fn repeated_lines_compound_on_the_working_copy() {
        let mut fx = Fixture::new();
        let p = fx.physical("Taladro", 5, 5);
        let plan = fx.plan(&fx.request(SaleOperation::Confirmar, vec![(p, 3), (p, 3)]));
        // Second line sees 2 left, not 5.
        assert!(!plan.is_clean());
        assert_eq!(plan.errors[0].line, 1);

        let plan = fx.plan(&fx.request(SaleOperation::Confirmar, vec![(p, 3), (p, 2)]));
        assert!(plan.is_clean());
        assert_eq!(plan.writes.len(), 1);
        assert_eq!(plan.writes[0].quantity, 0);
        assert_eq!(plan.entries.len(), 2);
    }

    #[test]
    fn reservation_touches_only_availability() {
        let mut fx = Fixture::new();
        let p = fx.physical("Taladro", 10, 10);
        let plan = fx.plan(&fx.request(ReservationOperation::Reservar, vec![(p, 4)]));
        assert_eq!((plan.writes[0].quantity, plan.writes[0].available), (10, 6));
        let entry = &plan.entries[0];
        assert_eq!(entry.table, AuditTable::Availability);
        assert_eq!(entry.operation, AuditOperation::Reservation);
        assert_eq!(entry.delta(), -4);
    }

    #[test]
    fn reserving_more_than_available_is_a_conflict() {
        let mut fx = Fixture::new();
        let p = fx.physical("Taladro", 10, 2);
        let result = fx
            .plan(&fx.request(ReservationOperation::Reservar, vec![(p, 3)]))
            .into_result();
        assert!(!result.success);
        assert_eq!(result.first_error_kind(), Some(ErrorKind::Conflict));
    }

    #[test]
    fn reserving_on_a_drifted_row_fails_the_line() {
        let mut fx = Fixture::new();
        let p = fx.physical("Taladro", 10, 15);
        let plan = fx.plan(&fx.request(ReservationOperation::Reservar, vec![(p, 2)]));

        assert!(!plan.is_clean());
        assert_eq!(plan.errors[0].kind, ErrorKind::Conflict);
        assert!(plan.errors[0].message.contains("exceeds stock"));
        let result = plan.into_result();
        assert!(!result.success);
        assert_eq!(result.details[0].status, ItemStatus::Failed);
    }

    #[test]
    fn release_is_capped_at_stock() {
        let mut fx = Fixture::new();
        let p = fx.physical("Taladro", 10, 9);
        let plan = fx.plan(&fx.request(ReservationOperation::Liberar, vec![(p, 5)]));
        assert_eq!(plan.writes[0].available, 10);
    }

    #[test]
    fn unknown_and_foreign_products_are_not_found() {
        let mut fx = Fixture::new();
        let foreign = ProductId::new();
        fx.products.insert(
            foreign,
            ProductInfo::physical(TenantId::new(), foreign, "Ajeno"),
        );
        let result = fx
            .plan(&fx.request(PurchaseOperation::Recibir, vec![(ProductId::new(), 1), (foreign, 1)]))
            .into_result();
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(|e| e.kind == ErrorKind::NotFound));
    }

    #[test]
    fn invalid_quantity_is_a_validation_error() {
        let mut fx = Fixture::new();
        let p = fx.physical("Taladro", 10, 10);
        let result = fx
            .plan(&fx.request(PurchaseOperation::Recibir, vec![(p, 0)]))
            .into_result();
        assert_eq!(result.first_error_kind(), Some(ErrorKind::Validation));
    }

    #[test]
    fn empty_requests_are_rejected_upfront() {
        let fx = Fixture::new();
        let req = fx.request(SaleOperation::Confirmar, vec![]);
        assert_eq!(req.validate(), Err(InventoryError::EmptySync));
    }

    #[test]
    fn terminal_states_are_final() {
        let line = SyncLine {
            product_id: ProductId::new(),
            quantity: 1,
            price: None,
        };
        let mut detail = ItemDetail::pending(0, &line);
        assert!(!detail.transition(ItemStatus::Pending));
        assert!(detail.transition(ItemStatus::Failed));
        assert!(!detail.transition(ItemStatus::Applied));
        assert_eq!(detail.status, ItemStatus::Failed);
    }

    #[test]
    fn product_ids_are_sorted_and_unique() {
        let fx = Fixture::new();
        let a = ProductId::new();
        let b = ProductId::new();
        let req = fx.request(SaleOperation::Confirmar, vec![(b, 1), (a, 1), (b, 2)]);
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(req.product_ids(), expected);
    }
}

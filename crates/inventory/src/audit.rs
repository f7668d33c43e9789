//! Append-only audit ledger records and their read-side aggregations.
//!
//! Entries are typed: the operation is a tagged enum instead of a free-form JSON
//! blob, so filters are plain field comparisons (and plain columns in SQL).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockwise_core::{DomainError, ProductId, TenantId, UserId};

use crate::error::{InventoryError, InventoryResult};
use crate::level::StockLevel;
use crate::movement::{Movement, MovementOutcome, MovementType, Reference, ReferenceType};
use crate::product::ProductInfo;

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 500;

/// Record family an entry describes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditTable {
    Stock,
    Availability,
}

impl AuditTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            AuditTable::Stock => "stock_records",
            AuditTable::Availability => "availability_records",
        }
    }

    pub fn from_table_name(name: &str) -> Result<Self, DomainError> {
        match name {
            "stock_records" => Ok(AuditTable::Stock),
            "availability_records" => Ok(AuditTable::Availability),
            other => Err(DomainError::validation(format!("unknown audit table '{other}'"))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "movement_type", rename_all = "snake_case")]
pub enum AuditOperation {
    Movement(MovementType),
    AvailabilityUpdate,
    Reservation,
    Release,
    Reconciliation,
    ProductRegistered,
    ProductRemoved,
}

impl AuditOperation {
    /// Stable label, also used as the `operation` column value.
    pub fn label(&self) -> &'static str {
        match self {
            AuditOperation::Movement(_) => "movement",
            AuditOperation::AvailabilityUpdate => "availability_update",
            AuditOperation::Reservation => "reservation",
            AuditOperation::Release => "release",
            AuditOperation::Reconciliation => "reconciliation",
            AuditOperation::ProductRegistered => "product_registered",
            AuditOperation::ProductRemoved => "product_removed",
        }
    }

    pub fn movement_type(&self) -> Option<MovementType> {
        match self {
            AuditOperation::Movement(t) => Some(*t),
            _ => None,
        }
    }

    /// Rebuild from the persisted `(operation, movement_type)` columns.
    pub fn from_parts(label: &str, movement_type: Option<MovementType>) -> Result<Self, DomainError> {
        match (label, movement_type) {
            ("movement", Some(t)) => Ok(AuditOperation::Movement(t)),
            ("availability_update", None) => Ok(AuditOperation::AvailabilityUpdate),
            ("reservation", None) => Ok(AuditOperation::Reservation),
            ("release", None) => Ok(AuditOperation::Release),
            ("reconciliation", None) => Ok(AuditOperation::Reconciliation),
            ("product_registered", None) => Ok(AuditOperation::ProductRegistered),
            ("product_removed", None) => Ok(AuditOperation::ProductRemoved),
            (label, t) => Err(DomainError::validation(format!(
                "invalid audit operation '{label}' (movement type: {t:?})"
            ))),
        }
    }

    /// Grouping key used by statistics and reports.
    pub fn summary_key(&self) -> String {
        match self {
            AuditOperation::Movement(t) => t.as_str().to_string(),
            other => other.label().to_uppercase(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityChange {
    pub before: i64,
    pub after: i64,
}

impl QuantityChange {
    pub fn new(before: i64, after: i64) -> Self {
        Self { before, after }
    }

    pub fn delta(&self) -> i64 {
        self.after - self.before
    }
}

/// One immutable ledger entry.
///
/// `quantity` is the change to the record named by `table`; stock movements also
/// carry the availability side effect in `available`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub table: AuditTable,
    pub record_id: ProductId,
    pub actor_id: Option<UserId>,
    pub operation: AuditOperation,
    pub quantity: QuantityChange,
    pub available: Option<QuantityChange>,
    pub reason: String,
    pub reference: Option<Reference>,
    pub product_name: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Entry for an applied stock movement.
    pub fn movement(
        tenant_id: TenantId,
        product_name: impl Into<String>,
        movement: &Movement,
        outcome: &MovementOutcome,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            tenant_id,
            table: AuditTable::Stock,
            record_id: movement.product_id,
            actor_id: movement.actor_id,
            operation: AuditOperation::Movement(movement.movement_type),
            quantity: QuantityChange::new(outcome.previous_qty, outcome.new_qty),
            available: Some(QuantityChange::new(
                outcome.available_before,
                outcome.available_after,
            )),
            reason: movement.reason.trim().to_string(),
            reference: movement.reference.clone(),
            product_name: product_name.into(),
            recorded_at,
        }
    }

    /// Entry for a change that only touches availability.
    #[allow(clippy::too_many_arguments)]
    pub fn availability(
        tenant_id: TenantId,
        product_name: impl Into<String>,
        operation: AuditOperation,
        before: &StockLevel,
        after: &StockLevel,
        reason: impl Into<String>,
        actor_id: Option<UserId>,
        reference: Option<Reference>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            tenant_id,
            table: AuditTable::Availability,
            record_id: after.product_id,
            actor_id,
            operation,
            quantity: QuantityChange::new(before.available, after.available),
            available: None,
            reason: reason.into(),
            reference,
            product_name: product_name.into(),
            recorded_at,
        }
    }

    /// Entry for the creation or removal of a product's records.
    pub fn lifecycle(
        tenant_id: TenantId,
        product: &ProductInfo,
        operation: AuditOperation,
        level: &StockLevel,
        actor_id: Option<UserId>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let (quantity, available, reason) = match operation {
            AuditOperation::ProductRemoved => (
                QuantityChange::new(level.quantity, 0),
                QuantityChange::new(level.available, 0),
                "Registros de inventario eliminados",
            ),
            _ => (
                QuantityChange::new(0, level.quantity),
                QuantityChange::new(0, level.available),
                "Registros de inventario creados",
            ),
        };
        Self {
            id: Uuid::now_v7(),
            tenant_id,
            table: AuditTable::Stock,
            record_id: product.id,
            actor_id,
            operation,
            quantity,
            available: Some(available),
            reason: reason.to_string(),
            reference: None,
            product_name: product.name.clone(),
            recorded_at,
        }
    }

    pub fn delta(&self) -> i64 {
        self.quantity.delta()
    }

    pub fn reference_type(&self) -> Option<ReferenceType> {
        self.reference.as_ref().map(|r| r.reference_type)
    }
}

/// Inclusive `[from, to]` window; open ends are unbounded.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|f| at >= f) && self.to.is_none_or(|t| at <= t)
    }

    pub fn validate(&self) -> InventoryResult<()> {
        match (self.from, self.to) {
            (Some(f), Some(t)) if f > t => Err(InventoryError::InvalidQuery(format!(
                "date range start {f} is after end {t}"
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub date_range: DateRange,
    pub product_id: Option<ProductId>,
    pub actor_id: Option<UserId>,
    pub movement_type: Option<MovementType>,
    pub reference_type: Option<ReferenceType>,
    pub page: u32,
    pub limit: u32,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            date_range: DateRange::default(),
            product_id: None,
            actor_id: None,
            movement_type: None,
            reference_type: None,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl AuditQuery {
    pub fn validate(&self) -> InventoryResult<()> {
        if self.page == 0 {
            return Err(InventoryError::InvalidQuery("page starts at 1".to_string()));
        }
        if self.limit == 0 || self.limit > MAX_PAGE_LIMIT {
            return Err(InventoryError::InvalidQuery(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        self.date_range.validate()
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.date_range.contains(entry.recorded_at)
            && self.product_id.is_none_or(|p| entry.record_id == p)
            && self.actor_id.is_none_or(|a| entry.actor_id == Some(a))
            && self
                .movement_type
                .is_none_or(|t| entry.operation.movement_type() == Some(t))
            && self
                .reference_type
                .is_none_or(|t| entry.reference_type() == Some(t))
    }

    /// Filter, order newest-first and cut one page out of `entries`.
    pub fn paginate(&self, entries: impl IntoIterator<Item = AuditEntry>) -> AuditPage {
        let mut matching: Vec<AuditEntry> = entries.into_iter().filter(|e| self.matches(e)).collect();
        sort_newest_first(&mut matching);
        let total = matching.len() as u64;
        let entries = matching
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .collect();
        AuditPage {
            entries,
            total,
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Newest first; UUIDv7 ids break timestamp ties in insertion order.
pub fn sort_newest_first(entries: &mut [AuditEntry]) {
    entries.sort_by(|a, b| {
        b.recorded_at
            .cmp(&a.recorded_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl AuditPage {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.limit.max(1)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStatistics {
    pub total_entries: u64,
    pub by_operation: BTreeMap<String, u64>,
    pub by_day: BTreeMap<NaiveDate, u64>,
    pub distinct_products: usize,
    pub distinct_actors: usize,
    /// Sum of positive stock deltas.
    pub units_in: i64,
    /// Sum of negative stock deltas, as a positive number.
    pub units_out: i64,
}

impl AuditStatistics {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a AuditEntry>) -> Self {
        let mut stats = AuditStatistics::default();
        let mut products = BTreeSet::new();
        let mut actors = BTreeSet::new();

        for entry in entries {
            stats.total_entries += 1;
            *stats
                .by_operation
                .entry(entry.operation.summary_key())
                .or_default() += 1;
            *stats.by_day.entry(entry.recorded_at.date_naive()).or_default() += 1;
            products.insert(entry.record_id);
            if let Some(actor) = entry.actor_id {
                actors.insert(actor);
            }
            if entry.table == AuditTable::Stock {
                let delta = entry.delta();
                if delta > 0 {
                    stats.units_in += delta;
                } else {
                    stats.units_out -= delta;
                }
            }
        }

        stats.distinct_products = products.len();
        stats.distinct_actors = actors.len();
        stats
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    NegativeStock,
    NegativeAvailability,
    AvailabilityExceedsStock,
    MissingRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyViolation {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Option<i64>,
    pub available: Option<i64>,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub tenant_id: TenantId,
    pub checked: usize,
    pub consistent: usize,
    pub violations: Vec<ConsistencyViolation>,
    pub consistency_percentage: f64,
    pub checked_at: DateTime<Utc>,
}

impl ConsistencyReport {
    /// Check every physical product's level against the global invariants.
    ///
    /// A product with several violations is listed once per violation but counted
    /// once as inconsistent.
    pub fn scan<'a>(
        tenant_id: TenantId,
        products: impl IntoIterator<Item = (&'a ProductInfo, Option<&'a StockLevel>)>,
        checked_at: DateTime<Utc>,
    ) -> Self {
        let mut checked = 0;
        let mut consistent = 0;
        let mut violations = Vec::new();

        for (product, level) in products {
            if product.is_service {
                continue;
            }
            checked += 1;

            let Some(level) = level else {
                violations.push(ConsistencyViolation {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    quantity: None,
                    available: None,
                    kind: ViolationKind::MissingRecord,
                });
                continue;
            };

            let mut kinds = Vec::new();
            if level.quantity < 0 {
                kinds.push(ViolationKind::NegativeStock);
            }
            if level.available < 0 {
                kinds.push(ViolationKind::NegativeAvailability);
            }
            if level.available > level.quantity {
                kinds.push(ViolationKind::AvailabilityExceedsStock);
            }

            if kinds.is_empty() {
                consistent += 1;
            }
            violations.extend(kinds.into_iter().map(|kind| ConsistencyViolation {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: Some(level.quantity),
                available: Some(level.available),
                kind,
            }));
        }

        let consistency_percentage = if checked == 0 {
            100.0
        } else {
            (consistent as f64 / checked as f64) * 100.0
        };

        Self {
            tenant_id,
            checked,
            consistent,
            violations,
            consistency_percentage,
            checked_at,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Denormalized, export-ready ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReportRow {
    pub entry_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub product_id: ProductId,
    pub product_name: String,
    pub category: Option<String>,
    pub table_name: String,
    pub operation: String,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<String>,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub delta: i64,
    pub reason: String,
    pub actor_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: u64,
    pub by_operation: BTreeMap<String, u64>,
    pub by_reference_type: BTreeMap<String, u64>,
    pub by_product: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub tenant_id: TenantId,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<AuditReportRow>,
    pub summary: ReportSummary,
}

impl AuditReport {
    /// Build a report from already-filtered entries.
    ///
    /// `lookup` resolves the current catalog data; products deleted since the
    /// entry was written fall back to the name captured in the entry.
    pub fn build<F>(
        tenant_id: TenantId,
        mut entries: Vec<AuditEntry>,
        lookup: F,
        generated_at: DateTime<Utc>,
    ) -> Self
    where
        F: Fn(ProductId) -> Option<ProductInfo>,
    {
        sort_newest_first(&mut entries);
        let mut summary = ReportSummary::default();
        let mut rows = Vec::with_capacity(entries.len());

        for entry in entries {
            let product = lookup(entry.record_id);
            let product_name = product
                .as_ref()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| entry.product_name.clone());
            let operation = entry.operation.summary_key();

            summary.total += 1;
            *summary.by_operation.entry(operation.clone()).or_default() += 1;
            let reference_key = entry
                .reference_type()
                .map(|t| t.as_str().to_string())
                .unwrap_or_else(|| "NONE".to_string());
            *summary.by_reference_type.entry(reference_key).or_default() += 1;
            *summary.by_product.entry(product_name.clone()).or_default() += 1;

            rows.push(AuditReportRow {
                entry_id: entry.id,
                recorded_at: entry.recorded_at,
                product_id: entry.record_id,
                category: product.and_then(|p| p.category),
                product_name,
                table_name: entry.table.table_name().to_string(),
                operation,
                reference_type: entry.reference_type(),
                reference_id: entry.reference.as_ref().map(|r| r.id.clone()),
                quantity_before: entry.quantity.before,
                quantity_after: entry.quantity.after,
                delta: entry.delta(),
                reason: entry.reason,
                actor_id: entry.actor_id,
            });
        }

        Self {
            tenant_id,
            generated_at,
            rows,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    fn entry(tenant: TenantId, product: ProductId, t: MovementType, before: i64, after: i64, when: DateTime<Utc>) -> AuditEntry {
        let movement = Movement::new(product, (after - before).abs().max(1), t, "entrada de prueba");
        let outcome = MovementOutcome {
            previous_qty: before,
            new_qty: after,
            delta: after - before,
            available_before: before,
            available_after: after,
        };
        AuditEntry::movement(tenant, "Martillo", &movement, &outcome, when)
    }

    #[test]
    fn operation_round_trips_through_columns() {
        for op in [
            AuditOperation::Movement(MovementType::Ajuste),
            AuditOperation::Reservation,
            AuditOperation::Reconciliation,
            AuditOperation::ProductRemoved,
        ] {
            assert_eq!(AuditOperation::from_parts(op.label(), op.movement_type()).unwrap(), op);
        }
        assert!(AuditOperation::from_parts("movement", None).is_err());
    }

    #[test]
    fn operation_serializes_as_tagged_record() {
        let json = serde_json::to_value(AuditOperation::Movement(MovementType::Salida)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "movement", "movement_type": "SALIDA"}));
    }

    #[test]
    fn paginate_orders_newest_first_and_filters() {
        let tenant = TenantId::new();
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let entries = vec![
            entry(tenant, p1, MovementType::Entrada, 0, 10, at(1, 9)),
            entry(tenant, p1, MovementType::Salida, 10, 7, at(2, 9)),
            entry(tenant, p2, MovementType::Entrada, 0, 3, at(3, 9)),
        ];

        let page = AuditQuery::default().paginate(entries.clone());
        assert_eq!(page.total, 3);
        assert_eq!(page.entries[0].recorded_at, at(3, 9));
        assert_eq!(page.entries[2].recorded_at, at(1, 9));

        let q = AuditQuery {
            product_id: Some(p1),
            movement_type: Some(MovementType::Salida),
            ..AuditQuery::default()
        };
        let page = q.paginate(entries.clone());
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].delta(), -3);

        let q = AuditQuery {
            page: 2,
            limit: 2,
            ..AuditQuery::default()
        };
        let page = q.paginate(entries);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.total_pages(), 2);
    }

    #[test]
    fn query_validation_rejects_bad_pages_and_ranges() {
        assert!(AuditQuery { page: 0, ..AuditQuery::default() }.validate().is_err());
        assert!(AuditQuery { limit: MAX_PAGE_LIMIT + 1, ..AuditQuery::default() }.validate().is_err());
        let inverted = AuditQuery {
            date_range: DateRange::new(Some(at(5, 0)), Some(at(4, 0))),
            ..AuditQuery::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn statistics_count_by_type_day_and_units() {
        let tenant = TenantId::new();
        let p = ProductId::new();
        let actor = UserId::new();
        let mut e1 = entry(tenant, p, MovementType::Entrada, 0, 10, at(1, 9));
        e1.actor_id = Some(actor);
        let e2 = entry(tenant, p, MovementType::Salida, 10, 4, at(1, 15));
        let e3 = entry(tenant, ProductId::new(), MovementType::Entrada, 0, 2, at(1, 9) + Duration::days(1));

        let stats = AuditStatistics::from_entries([&e1, &e2, &e3]);
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.by_operation["ENTRADA"], 2);
        assert_eq!(stats.by_operation["SALIDA"], 1);
        assert_eq!(stats.by_day.len(), 2);
        assert_eq!(stats.distinct_products, 2);
        assert_eq!(stats.distinct_actors, 1);
        assert_eq!((stats.units_in, stats.units_out), (12, 6));
    }

    #[test]
    fn consistency_scan_reports_each_violation() {
        let tenant = TenantId::new();
        let ok = ProductInfo::physical(tenant, ProductId::new(), "ok");
        let over = ProductInfo::physical(tenant, ProductId::new(), "over");
        let missing = ProductInfo::physical(tenant, ProductId::new(), "missing");
        let service = ProductInfo::service(tenant, ProductId::new(), "svc");

        let ok_level = StockLevel { quantity: 5, available: 5, ..StockLevel::new(ok.id) };
        let over_level = StockLevel { quantity: 5, available: 9, ..StockLevel::new(over.id) };

        let report = ConsistencyReport::scan(
            tenant,
            vec![
                (&ok, Some(&ok_level)),
                (&over, Some(&over_level)),
                (&missing, None),
                (&service, None),
            ],
            at(1, 0),
        );

        assert_eq!(report.checked, 3);
        assert_eq!(report.consistent, 1);
        assert_eq!(report.violations.len(), 2);
        assert_eq!(report.violations[0].kind, ViolationKind::AvailabilityExceedsStock);
        assert_eq!(report.violations[1].kind, ViolationKind::MissingRecord);
        assert!((report.consistency_percentage - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_scan_is_fully_consistent() {
        let report = ConsistencyReport::scan(TenantId::new(), Vec::new(), at(1, 0));
        assert_eq!(report.consistency_percentage, 100.0);
        assert!(report.is_consistent());
    }

    #[test]
    fn report_prefers_current_catalog_name_and_summarizes() {
        let tenant = TenantId::new();
        let p = ProductId::new();
        let mut e = entry(tenant, p, MovementType::Entrada, 0, 10, at(1, 9));
        e.reference = Some(Reference::new(ReferenceType::Compra, "C-1"));
        let renamed = ProductInfo::physical(tenant, p, "Martillo de uña").with_category("Herramientas");

        let report = AuditReport::build(tenant, vec![e], |id| (id == p).then(|| renamed.clone()), at(2, 0));
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].product_name, "Martillo de uña");
        assert_eq!(report.rows[0].category.as_deref(), Some("Herramientas"));
        assert_eq!(report.rows[0].table_name, "stock_records");
        assert_eq!(report.summary.by_reference_type["COMPRA"], 1);
        assert_eq!(report.summary.by_product["Martillo de uña"], 1);
    }
}

//! Inventory consistency domain.
//!
//! This crate contains the business rules of the engine (validation, movement
//! arithmetic, sync planning, alert classification, audit records and their
//! aggregations), implemented purely as deterministic domain logic (no IO, no
//! storage, no clocks except where a timestamp is passed in).

pub mod alert;
pub mod audit;
pub mod error;
pub mod level;
pub mod movement;
pub mod product;
pub mod sync;
pub mod validation;

pub use alert::{Alert, AlertChannel, AlertConfig, AlertDashboard, AlertPriority, AlertType};
pub use audit::{
    AuditEntry, AuditOperation, AuditPage, AuditQuery, AuditReport, AuditStatistics, AuditTable,
    ConsistencyReport, DateRange, QuantityChange,
};
pub use error::{InventoryError, InventoryResult};
pub use level::StockLevel;
pub use movement::{Movement, MovementOutcome, MovementType, Reference, ReferenceType};
pub use product::ProductInfo;
pub use sync::{
    ItemDetail, ItemStatus, PurchaseOperation, ReservationOperation, SaleOperation, SyncItemError,
    SyncKind, SyncLine, SyncOperation, SyncPlan, SyncRequest, SyncResult,
};

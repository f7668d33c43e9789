//! Inventory error model.
//!
//! Every variant names the precondition or invariant it guards so messages can be
//! surfaced to callers verbatim.

use thiserror::Error;

use stockwise_core::{DomainError, ErrorKind, ProductId};

use crate::movement::MovementType;
use crate::validation::{MAX_QUANTITY, MAX_REASON_LEN, MAX_THRESHOLD, MIN_REASON_LEN};

pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("stock record for product {0} not found")]
    StockRecordNotFound(ProductId),

    #[error("product {0} is a service and carries no inventory")]
    NotPhysicalProduct(ProductId),

    #[error("stock record for product {0} already exists")]
    AlreadyRegistered(ProductId),

    #[error("quantity {0} out of range: must be an integer between 1 and {MAX_QUANTITY}")]
    InvalidQuantity(i64),

    #[error("adjustment target {0} out of range: must be between 0 and {MAX_QUANTITY}")]
    InvalidAdjustTarget(i64),

    #[error("reason must be {MIN_REASON_LEN}..={MAX_REASON_LEN} characters (got {0})")]
    InvalidReason(usize),

    #[error("alert threshold {0} out of range: must be between 0 and {MAX_THRESHOLD}")]
    InvalidThreshold(i64),

    #[error("invalid alert config: {0}")]
    InvalidAlertConfig(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("sync request must contain at least one item")]
    EmptySync,

    #[error(
        "insufficient stock for product {product_id}: requested {requested}, on hand {on_hand}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        on_hand: i64,
    },

    #[error(
        "insufficient availability for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientAvailability {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error(
        "availability {requested} for product {product_id} exceeds stock on hand {on_hand}"
    )]
    AvailabilityExceedsStock {
        product_id: ProductId,
        requested: i64,
        on_hand: i64,
    },

    #[error("movement type {0} is not supported")]
    UnsupportedMovementType(MovementType),

    #[error("invariant violated for product {product_id}: {detail}")]
    InvariantViolation { product_id: ProductId, detail: String },
}

impl InventoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::ProductNotFound(_) | InventoryError::StockRecordNotFound(_) => {
                ErrorKind::NotFound
            }
            InventoryError::InsufficientStock { .. }
            | InventoryError::InsufficientAvailability { .. }
            | InventoryError::AlreadyRegistered(_)
            | InventoryError::InvariantViolation { .. } => ErrorKind::Conflict,
            InventoryError::NotPhysicalProduct(_)
            | InventoryError::InvalidQuantity(_)
            | InventoryError::InvalidAdjustTarget(_)
            | InventoryError::InvalidReason(_)
            | InventoryError::InvalidThreshold(_)
            | InventoryError::InvalidAlertConfig(_)
            | InventoryError::InvalidQuery(_)
            | InventoryError::EmptySync
            | InventoryError::AvailabilityExceedsStock { .. }
            | InventoryError::UnsupportedMovementType(_) => ErrorKind::Validation,
        }
    }
}

impl From<InventoryError> for DomainError {
    fn from(err: InventoryError) -> Self {
        let msg = err.to_string();
        match err {
            InventoryError::InvariantViolation { .. } => DomainError::invariant(msg),
            other => match other.kind() {
                ErrorKind::NotFound => DomainError::not_found(msg),
                ErrorKind::Conflict => DomainError::conflict(msg),
                ErrorKind::Validation | ErrorKind::System => DomainError::validation(msg),
            },
        }
    }
}

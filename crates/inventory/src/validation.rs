//! Precondition checks shared by every writer.
//!
//! All functions are pure; callers run them before touching any row.

use stockwise_core::{ProductId, TenantId};

use crate::error::{InventoryError, InventoryResult};
use crate::product::ProductInfo;

pub const MAX_QUANTITY: i64 = 999_999;
pub const MIN_REASON_LEN: usize = 5;
pub const MAX_REASON_LEN: usize = 200;
pub const MAX_THRESHOLD: i64 = 1000;

/// Product must exist, belong to `tenant_id` and be physical.
///
/// A product owned by another tenant is reported as not found so tenants cannot
/// probe each other's catalogs.
pub fn ensure_physical<'a>(
    product: Option<&'a ProductInfo>,
    tenant_id: TenantId,
    product_id: ProductId,
) -> InventoryResult<&'a ProductInfo> {
    let product = product
        .filter(|p| p.tenant_id == tenant_id)
        .ok_or(InventoryError::ProductNotFound(product_id))?;
    if product.is_service {
        return Err(InventoryError::NotPhysicalProduct(product_id));
    }
    Ok(product)
}

pub fn validate_quantity(quantity: i64) -> InventoryResult<()> {
    if (1..=MAX_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(InventoryError::InvalidQuantity(quantity))
    }
}

/// Absolute targets (stock counts) may legitimately be zero.
pub fn validate_adjust_target(target: i64) -> InventoryResult<()> {
    if (0..=MAX_QUANTITY).contains(&target) {
        Ok(())
    } else {
        Err(InventoryError::InvalidAdjustTarget(target))
    }
}

pub fn ensure_sufficient_stock(
    product_id: ProductId,
    on_hand: i64,
    requested: i64,
) -> InventoryResult<()> {
    if on_hand >= requested {
        Ok(())
    } else {
        Err(InventoryError::InsufficientStock {
            product_id,
            requested,
            on_hand,
        })
    }
}

pub fn ensure_sufficient_availability(
    product_id: ProductId,
    available: i64,
    requested: i64,
) -> InventoryResult<()> {
    if available >= requested {
        Ok(())
    } else {
        Err(InventoryError::InsufficientAvailability {
            product_id,
            requested,
            available,
        })
    }
}

pub fn validate_threshold(threshold: i64) -> InventoryResult<()> {
    if (0..=MAX_THRESHOLD).contains(&threshold) {
        Ok(())
    } else {
        Err(InventoryError::InvalidThreshold(threshold))
    }
}

/// Returns the trimmed reason.
pub fn validate_reason(reason: &str) -> InventoryResult<&str> {
    let trimmed = reason.trim();
    let len = trimmed.chars().count();
    if (MIN_REASON_LEN..=MAX_REASON_LEN).contains(&len) {
        Ok(trimmed)
    } else {
        Err(InventoryError::InvalidReason(len))
    }
}

/// A manual availability update must stay within `0..=on_hand`.
pub fn validate_availability(product_id: ProductId, requested: i64, on_hand: i64) -> InventoryResult<()> {
    if requested < 0 {
        return Err(InventoryError::InvalidAdjustTarget(requested));
    }
    if requested > on_hand {
        return Err(InventoryError::AvailabilityExceedsStock {
            product_id,
            requested,
            on_hand,
        });
    }
    Ok(())
}

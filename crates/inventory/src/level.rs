use serde::{Deserialize, Serialize};

use stockwise_core::ProductId;

use crate::error::{InventoryError, InventoryResult};
use crate::validation;

/// Current stock and availability of one physical product.
///
/// `quantity` is the total on hand; `available` is the reservable subset.
/// After every successful operation `0 <= available <= quantity` holds.
/// `version` is owned by the store and bumped on every write.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub quantity: i64,
    pub available: i64,
    pub version: u64,
}

impl StockLevel {
    /// Level of a freshly registered product.
    pub fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            quantity: 0,
            available: 0,
            version: 0,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.quantity >= 0 && self.available >= 0 && self.available <= self.quantity
    }

    pub fn check_invariants(&self) -> InventoryResult<()> {
        let detail = if self.quantity < 0 {
            format!("stock {} is negative", self.quantity)
        } else if self.available < 0 {
            format!("availability {} is negative", self.available)
        } else if self.available > self.quantity {
            format!(
                "availability {} exceeds stock {}",
                self.available, self.quantity
            )
        } else {
            return Ok(());
        };
        Err(InventoryError::InvariantViolation {
            product_id: self.product_id,
            detail,
        })
    }

    /// Commit `quantity` units of availability (stock is untouched).
    pub fn reserve(&self, quantity: i64) -> InventoryResult<Self> {
        validation::validate_quantity(quantity)?;
        validation::ensure_sufficient_availability(self.product_id, self.available, quantity)?;
        Ok(Self {
            available: self.available - quantity,
            ..*self
        })
    }

    /// Return `quantity` units of availability, never beyond stock on hand.
    pub fn release(&self, quantity: i64) -> InventoryResult<Self> {
        validation::validate_quantity(quantity)?;
        Ok(Self {
            available: (self.available + quantity).min(self.quantity).max(0),
            ..*self
        })
    }

    /// Manual availability override, bounded by stock.
    pub fn with_availability(&self, available: i64) -> InventoryResult<Self> {
        validation::validate_availability(self.product_id, available, self.quantity)?;
        Ok(Self { available, ..*self })
    }

    /// Availability forced into `0..=quantity`. Stock is ground truth and is
    /// left as is, even when negative.
    pub fn clamped(&self) -> Self {
        let ceiling = self.quantity.max(0);
        Self {
            available: self.available.clamp(0, ceiling),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(quantity: i64, available: i64) -> StockLevel {
        StockLevel {
            product_id: ProductId::new(),
            quantity,
            available,
            version: 1,
        }
    }

    #[test]
    fn new_level_is_empty_and_consistent() {
        let l = StockLevel::new(ProductId::new());
        assert_eq!((l.quantity, l.available, l.version), (0, 0, 0));
        assert!(l.is_consistent());
    }

    #[test]
    fn reserve_more_than_available_is_a_conflict() {
        let l = level(10, 2);
        match l.reserve(3) {
            Err(InventoryError::InsufficientAvailability {
                requested,
                available,
                ..
            }) => assert_eq!((requested, available), (3, 2)),
            other => panic!("expected insufficient availability, got {other:?}"),
        }
    }

    #[test]
    fn release_is_capped_at_stock() {
        let l = level(10, 8).release(5).unwrap();
        assert_eq!(l.available, 10);
        assert_eq!(l.quantity, 10);
    }

    #[test]
    fn clamped_fixes_both_directions() {
        assert_eq!(level(5, 9).clamped().available, 5);
        assert_eq!(level(5, -2).clamped().available, 0);
        let negative_stock = level(-3, 1).clamped();
        assert_eq!((negative_stock.quantity, negative_stock.available), (-3, 0));
    }

    #[test]
    fn check_invariants_names_the_violation() {
        let err = level(3, 4).check_invariants().unwrap_err();
        assert!(err.to_string().contains("availability 4 exceeds stock 3"));
        assert!(level(3, 3).check_invariants().is_ok());
    }
}

//! Typed, reason-coded stock movements and their arithmetic.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockwise_core::{DomainError, ProductId, UserId};

use crate::error::{InventoryError, InventoryResult};
use crate::level::StockLevel;
use crate::validation;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// Goods in.
    Entrada,
    /// Goods out.
    Salida,
    /// Physical count: the quantity is the new absolute stock.
    Ajuste,
    /// Between locations. Location tracking is not modelled, so this is rejected.
    Transferencia,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entrada => "ENTRADA",
            MovementType::Salida => "SALIDA",
            MovementType::Ajuste => "AJUSTE",
            MovementType::Transferencia => "TRANSFERENCIA",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ENTRADA" => Ok(MovementType::Entrada),
            "SALIDA" => Ok(MovementType::Salida),
            "AJUSTE" => Ok(MovementType::Ajuste),
            "TRANSFERENCIA" => Ok(MovementType::Transferencia),
            other => Err(DomainError::validation(format!("unknown movement type '{other}'"))),
        }
    }
}

/// Business document that caused a movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    Venta,
    Compra,
    Ajuste,
    Transferencia,
    Devolucion,
    /// Quotation holding a reservation.
    Cotizacion,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Venta => "VENTA",
            ReferenceType::Compra => "COMPRA",
            ReferenceType::Ajuste => "AJUSTE",
            ReferenceType::Transferencia => "TRANSFERENCIA",
            ReferenceType::Devolucion => "DEVOLUCION",
            ReferenceType::Cotizacion => "COTIZACION",
        }
    }
}

impl core::fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VENTA" => Ok(ReferenceType::Venta),
            "COMPRA" => Ok(ReferenceType::Compra),
            "AJUSTE" => Ok(ReferenceType::Ajuste),
            "TRANSFERENCIA" => Ok(ReferenceType::Transferencia),
            "DEVOLUCION" => Ok(ReferenceType::Devolucion),
            "COTIZACION" => Ok(ReferenceType::Cotizacion),
            other => Err(DomainError::validation(format!("unknown reference type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub reference_type: ReferenceType,
}

impl Reference {
    pub fn new(reference_type: ReferenceType, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reference_type,
        }
    }
}

/// A single typed, reasoned change to a product's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub product_id: ProductId,
    pub quantity: i64,
    pub movement_type: MovementType,
    pub reason: String,
    pub actor_id: Option<UserId>,
    pub reference: Option<Reference>,
}

impl Movement {
    pub fn new(
        product_id: ProductId,
        quantity: i64,
        movement_type: MovementType,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            product_id,
            quantity,
            movement_type,
            reason: reason.into(),
            actor_id: None,
            reference: None,
        }
    }

    pub fn by(mut self, actor_id: UserId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn referencing(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// Result of applying a movement to a level.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementOutcome {
    pub previous_qty: i64,
    pub new_qty: i64,
    /// Signed change in stock (`new_qty - previous_qty`).
    pub delta: i64,
    pub available_before: i64,
    pub available_after: i64,
}

impl StockLevel {
    /// Compute the effect of `movement` on this level.
    ///
    /// Returns the level to persist (version untouched; the store bumps it) and
    /// the before/after figures for the audit ledger.
    ///
    /// - `Entrada`: stock and availability grow by the quantity.
    /// - `Salida`: stock shrinks (must be sufficient); availability shrinks by the
    ///   same amount, floored at zero and capped at the new stock.
    /// - `Ajuste`: stock becomes the given absolute count; availability is capped
    ///   at it.
    pub fn apply_movement(
        &self,
        movement: &Movement,
    ) -> InventoryResult<(StockLevel, MovementOutcome)> {
        validation::validate_reason(&movement.reason)?;

        let (quantity, available) = match movement.movement_type {
            MovementType::Entrada => {
                validation::validate_quantity(movement.quantity)?;
                let quantity = self.quantity + movement.quantity;
                (quantity, (self.available + movement.quantity).min(quantity))
            }
            MovementType::Salida => {
                validation::validate_quantity(movement.quantity)?;
                validation::ensure_sufficient_stock(
                    self.product_id,
                    self.quantity,
                    movement.quantity,
                )?;
                let quantity = self.quantity - movement.quantity;
                (quantity, (self.available - movement.quantity).max(0).min(quantity))
            }
            MovementType::Ajuste => {
                validation::validate_adjust_target(movement.quantity)?;
                let quantity = movement.quantity;
                (quantity, self.available.min(quantity).max(0))
            }
            MovementType::Transferencia => {
                return Err(InventoryError::UnsupportedMovementType(movement.movement_type));
            }
        };

        let next = StockLevel {
            quantity,
            available,
            ..*self
        };

        let outcome = MovementOutcome {
            previous_qty: self.quantity,
            new_qty: quantity,
            delta: quantity - self.quantity,
            available_before: self.available,
            available_after: available,
        };
        Ok((next, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn level(quantity: i64, available: i64) -> StockLevel {
        StockLevel {
            product_id: ProductId::new(),
            quantity,
            available,
            version: 7,
        }
    }

    fn movement(l: &StockLevel, quantity: i64, movement_type: MovementType) -> Movement {
        Movement::new(l.product_id, quantity, movement_type, "movimiento de prueba")
    }

    #[test]
    fn entrada_increases_stock_and_availability() {
        let l = level(10, 4);
        let (next, out) = l.apply_movement(&movement(&l, 5, MovementType::Entrada)).unwrap();
        assert_eq!((out.previous_qty, out.new_qty, out.delta), (10, 15, 5));
        assert_eq!((out.available_before, out.available_after), (4, 9));
        assert_eq!((next.quantity, next.available, next.version), (15, 9, 7));
    }

    #[test]
    fn salida_beyond_stock_is_rejected() {
        let l = level(3, 3);
        let err = l.apply_movement(&movement(&l, 4, MovementType::Salida)).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                product_id: l.product_id,
                requested: 4,
                on_hand: 3
            }
        );
    }

    #[test]
    fn salida_floors_availability_at_zero() {
        // 8 of 10 units are committed elsewhere; shipping 5 leaves none reservable.
        let l = level(10, 2);
        let (_, out) = l.apply_movement(&movement(&l, 5, MovementType::Salida)).unwrap();
        assert_eq!((out.new_qty, out.available_after), (5, 0));
    }

    #[test]
    fn ajuste_sets_absolute_value_with_signed_delta() {
        let l = level(10, 10);
        let (_, out) = l.apply_movement(&movement(&l, 6, MovementType::Ajuste)).unwrap();
        assert_eq!((out.new_qty, out.delta, out.available_after), (6, -4, 6));

        let (_, out) = l.apply_movement(&movement(&l, 0, MovementType::Ajuste)).unwrap();
        assert_eq!((out.new_qty, out.delta, out.available_after), (0, -10, 0));
    }

    #[test]
    fn transferencia_is_unsupported() {
        let l = level(10, 10);
        assert_eq!(
            l.apply_movement(&movement(&l, 1, MovementType::Transferencia)),
            Err(InventoryError::UnsupportedMovementType(MovementType::Transferencia))
        );
    }

    #[test]
    fn short_reason_is_rejected_before_arithmetic() {
        let l = level(10, 10);
        let m = Movement::new(l.product_id, 1, MovementType::Entrada, "ok");
        assert_eq!(l.apply_movement(&m), Err(InventoryError::InvalidReason(2)));
    }

    #[test]
    fn movement_type_parses_case_insensitively() {
        assert_eq!("salida".parse::<MovementType>().unwrap(), MovementType::Salida);
        assert!("robo".parse::<MovementType>().is_err());
        assert_eq!(
            serde_json::to_string(&ReferenceType::Devolucion).unwrap(),
            "\"DEVOLUCION\""
        );
    }

    fn arb_movement_type() -> impl Strategy<Value = MovementType> {
        prop_oneof![
            Just(MovementType::Entrada),
            Just(MovementType::Salida),
            Just(MovementType::Ajuste),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: starting from a consistent level, any sequence of accepted
        /// movements keeps `0 <= available <= quantity`.
        #[test]
        fn accepted_movements_preserve_invariants(
            start in 0i64..1_000,
            reserved in 0i64..1_000,
            steps in prop::collection::vec((arb_movement_type(), 0i64..2_000), 1..40)
        ) {
            let mut l = StockLevel {
                product_id: ProductId::new(),
                quantity: start,
                available: start - reserved.min(start),
                version: 0,
            };

            for (kind, qty) in steps {
                let m = Movement::new(l.product_id, qty, kind, "propiedad invariante");
                if let Ok((next, out)) = l.apply_movement(&m) {
                    l = next;
                    prop_assert_eq!(out.delta, out.new_qty - out.previous_qty);
                }
                prop_assert!(l.is_consistent(), "inconsistent level: {:?}", l);
            }
        }

        /// Property: Entrada(n) followed by Salida(n) restores the original stock.
        #[test]
        fn entrada_then_salida_round_trips(start in 0i64..10_000, n in 1i64..=999_999) {
            let l = StockLevel { product_id: ProductId::new(), quantity: start, available: start, version: 0 };
            let (mid, up) = l.apply_movement(&Movement::new(l.product_id, n, MovementType::Entrada, "ida y vuelta")).unwrap();
            let (end, down) = mid.apply_movement(&Movement::new(l.product_id, n, MovementType::Salida, "ida y vuelta")).unwrap();
            prop_assert_eq!(up.delta, -down.delta);
            prop_assert_eq!(end.quantity, start);
            prop_assert_eq!(end.available, start);
        }
    }
}

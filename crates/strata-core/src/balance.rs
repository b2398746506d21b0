//! # Balance Delta Math
//!
//! Applies signed deltas to an [`InventoryBalance`] and keeps `available`
//! derived. Storage calls [`apply_delta`] on a loaded row and writes the
//! result back inside the same transaction as the layer change.
//!
//! ```text
//! available = on_hand - committed - reserved
//! ```

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::UnitCost;
use crate::types::{CostLayer, InventoryBalance, QuantityClass};

/// The single source of truth for `available`.
#[inline]
pub fn recompute_available(on_hand: i64, committed: i64, reserved: i64) -> i64 {
    on_hand - committed - reserved
}

fn must_stay_non_negative(class: QuantityClass) -> bool {
    matches!(
        class,
        QuantityClass::Committed | QuantityClass::Reserved | QuantityClass::Backordered
    )
}

/// Applies `delta` to the `class` quantity of `balance`.
///
/// On error `balance` is left unchanged.
///
/// ```rust
/// use chrono::Utc;
/// use strata_core::balance::apply_delta;
/// use strata_core::types::{InventoryBalance, ItemId, LocationId, QuantityClass};
///
/// let mut balance = InventoryBalance::new(ItemId::from("i"), LocationId::from("l"), None);
/// apply_delta(&mut balance, QuantityClass::OnHand, 20, Utc::now()).unwrap();
/// apply_delta(&mut balance, QuantityClass::Committed, 5, Utc::now()).unwrap();
/// assert_eq!(balance.available, 15);
/// ```
pub fn apply_delta(
    balance: &mut InventoryBalance,
    class: QuantityClass,
    delta: i64,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    let current = balance.quantity(class);
    let next = current.checked_add(delta).ok_or_else(|| {
        CoreError::invariant(format!("{} overflow applying delta {}", class, delta))
    })?;

    if next < 0 && must_stay_non_negative(class) {
        return Err(ValidationError::OutOfRange {
            field: class.as_str().to_string(),
            min: 0,
            max: i64::MAX,
        }
        .into());
    }

    match class {
        QuantityClass::OnHand => balance.on_hand = next,
        QuantityClass::Committed => balance.committed = next,
        QuantityClass::OnOrder => balance.on_order = next,
        QuantityClass::InTransit => balance.in_transit = next,
        QuantityClass::Reserved => balance.reserved = next,
        QuantityClass::Backordered => balance.backordered = next,
    }

    if class.affects_availability() {
        balance.available =
            recompute_available(balance.on_hand, balance.committed, balance.reserved);
    }
    if class.stamps_movement() {
        balance.last_movement_at = Some(now);
    }
    balance.updated_at = now;

    Ok(())
}

/// Weighted average unit cost over the layers that count toward on-hand.
///
/// `None` when those layers hold no stock; callers keep the previous average.
pub fn average_cost<'a>(layers: impl IntoIterator<Item = &'a CostLayer>) -> Option<UnitCost> {
    let (value, quantity) = layers
        .into_iter()
        .filter(|layer| layer.counts_on_hand())
        .fold((0i128, 0i64), |(value, quantity), layer| {
            (
                value + layer.unit_cost.raw() as i128 * layer.quantity_remaining as i128,
                quantity + layer.quantity_remaining,
            )
        });
    UnitCost::average(value, quantity)
}

/// Σ remaining over the layers that count toward on-hand.
pub fn layer_quantity<'a>(layers: impl IntoIterator<Item = &'a CostLayer>) -> i64 {
    layers
        .into_iter()
        .filter(|layer| layer.counts_on_hand())
        .map(|layer| layer.quantity_remaining)
        .sum()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CostLayerId, ItemId, LayerType, LocationId, QualityStatus};

    fn balance() -> InventoryBalance {
        InventoryBalance::new(ItemId::from("item"), LocationId::from("loc"), None)
    }

    fn layer(remaining: i64, cents: i64, quality: QualityStatus, voided: bool) -> CostLayer {
        let now = Utc::now();
        CostLayer {
            id: CostLayerId::generate(),
            sequence: 0,
            item_id: ItemId::from("item"),
            location_id: LocationId::from("loc"),
            source_reference: None,
            layer_type: LayerType::Receipt,
            quantity_received: remaining.max(1),
            quantity_remaining: remaining,
            unit_cost: UnitCost::from_cents(cents),
            original_unit_cost: UnitCost::from_cents(cents),
            landed_cost_per_unit: UnitCost::zero(),
            receipt_date: now,
            quality_status: quality,
            voided,
            void_reason: None,
            voided_at: None,
            created_at: now,
        }
    }

    #[test]
    fn test_available_tracks_every_relevant_class() {
        let mut b = balance();
        let now = Utc::now();
        apply_delta(&mut b, QuantityClass::OnHand, 30, now).unwrap();
        apply_delta(&mut b, QuantityClass::Committed, 8, now).unwrap();
        apply_delta(&mut b, QuantityClass::Reserved, 2, now).unwrap();
        assert_eq!(b.available, 20);

        apply_delta(&mut b, QuantityClass::OnHand, -10, now).unwrap();
        assert_eq!(b.available, 10);
        assert_eq!(b.available, recompute_available(b.on_hand, b.committed, b.reserved));
    }

    #[test]
    fn test_other_classes_leave_available_alone() {
        let mut b = balance();
        let now = Utc::now();
        apply_delta(&mut b, QuantityClass::OnHand, 5, now).unwrap();
        apply_delta(&mut b, QuantityClass::OnOrder, 100, now).unwrap();
        apply_delta(&mut b, QuantityClass::InTransit, 7, now).unwrap();
        apply_delta(&mut b, QuantityClass::Backordered, 3, now).unwrap();
        assert_eq!(b.available, 5);
        assert_eq!(b.on_order, 100);
        assert_eq!(b.in_transit, 7);
        assert_eq!(b.backordered, 3);
    }

    #[test]
    fn test_commitments_cannot_go_negative() {
        let mut b = balance();
        let now = Utc::now();
        apply_delta(&mut b, QuantityClass::Committed, 2, now).unwrap();

        let err = apply_delta(&mut b, QuantityClass::Committed, -3, now).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(b.committed, 2);

        assert!(apply_delta(&mut b, QuantityClass::Reserved, -1, now).is_err());
        assert!(apply_delta(&mut b, QuantityClass::Backordered, -1, now).is_err());
    }

    #[test]
    fn test_movement_stamp_only_for_on_hand_and_committed() {
        let mut b = balance();
        let now = Utc::now();
        apply_delta(&mut b, QuantityClass::OnOrder, 10, now).unwrap();
        assert!(b.last_movement_at.is_none());

        apply_delta(&mut b, QuantityClass::OnHand, 1, now).unwrap();
        assert_eq!(b.last_movement_at, Some(now));
    }

    #[test]
    fn test_average_cost_ignores_unavailable_layers() {
        let layers = vec![
            layer(10, 500, QualityStatus::Available, false),
            layer(10, 700, QualityStatus::Available, false),
            layer(10, 9_900, QualityStatus::Damaged, false),
            layer(10, 9_900, QualityStatus::Available, true),
        ];
        assert_eq!(average_cost(&layers), Some(UnitCost::from_cents(600)));
        assert_eq!(layer_quantity(&layers), 20);
        assert_eq!(average_cost(&layers[2..]), None);
    }
}

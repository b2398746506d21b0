//! # FIFO Draw Planning
//!
//! Decides which layers a decrease draws from, and how much from each.
//!
//! ## Plan Before Apply
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   candidates (any order)                                                │
//! │        │                                                                │
//! │        ▼  filter: remaining > 0, not voided, quality = available        │
//! │        ▼  sort:   receipt_date ASC, sequence ASC                        │
//! │                                                                         │
//! │   L1 (Jan 1) 10 @ $5.00 ──► draw 10 ──► $50.00                          │
//! │   L2 (Jan 5) 10 @ $7.00 ──► draw  5 ──► $35.00                          │
//! │   L3 (Jan 9)  8 @ $8.00     untouched                                   │
//! │                                                                         │
//! │   FifoPlan { draws: [L1×10, L2×5], total_cost: $85.00 }                 │
//! │                                                                         │
//! │   If Σ remaining < requested the plan is rejected as a whole and no     │
//! │   layer is touched. The storage layer applies a plan only once it is    │
//! │   complete.                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, UnitCost};
use crate::types::{ConsumptionId, CostLayer, CostLayerId, ItemId, LocationId};
use crate::validation::validate_quantity;

/// One planned draw against one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedDraw {
    pub cost_layer_id: CostLayerId,
    pub quantity: i64,
    pub unit_cost: UnitCost,
    pub total_cost: Money,
}

/// Complete plan satisfying a requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FifoPlan {
    pub draws: Vec<PlannedDraw>,
    pub total_cost: Money,
}

impl FifoPlan {
    pub fn quantity(&self) -> i64 {
        self.draws.iter().map(|d| d.quantity).sum()
    }
}

/// A draw that has been applied and recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDraw {
    pub consumption_id: ConsumptionId,
    pub cost_layer_id: CostLayerId,
    pub quantity: i64,
    pub unit_cost: UnitCost,
    pub total_cost: Money,
}

/// Outcome of a FIFO consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionResult {
    pub total_cost: Money,
    pub layers_consumed: Vec<LayerDraw>,
}

impl ConsumptionResult {
    pub fn quantity(&self) -> i64 {
        self.layers_consumed.iter().map(|d| d.quantity).sum()
    }

    /// Per-unit cost of the whole draw, rounded to 4 dp.
    pub fn average_unit_cost(&self) -> UnitCost {
        let value: i128 = self
            .layers_consumed
            .iter()
            .map(|d| d.unit_cost.raw() as i128 * d.quantity as i128)
            .sum();
        UnitCost::average(value, self.quantity()).unwrap_or_default()
    }
}

/// Plans a FIFO draw of `quantity` units from `candidates`.
///
/// `candidates` may contain layers that are not consumable; they are skipped.
/// All candidates must belong to `item_id` at `location_id`.
///
/// ```rust
/// use chrono::{Duration, Utc};
/// use strata_core::fifo::plan_fifo;
/// use strata_core::money::{Money, UnitCost};
/// use strata_core::types::*;
///
/// let now = Utc::now();
/// let layer = |seq: i64, days: i64, qty: i64, cents: i64| CostLayer {
///     id: CostLayerId::generate(),
///     sequence: seq,
///     item_id: ItemId::from("item"),
///     location_id: LocationId::from("loc"),
///     source_reference: None,
///     layer_type: LayerType::Receipt,
///     quantity_received: qty,
///     quantity_remaining: qty,
///     unit_cost: UnitCost::from_cents(cents),
///     original_unit_cost: UnitCost::from_cents(cents),
///     landed_cost_per_unit: UnitCost::zero(),
///     receipt_date: now + Duration::days(days),
///     quality_status: QualityStatus::Available,
///     voided: false,
///     void_reason: None,
///     voided_at: None,
///     created_at: now,
/// };
/// let layers = vec![layer(2, 4, 10, 700), layer(1, 0, 10, 500)];
///
/// let plan = plan_fifo(&ItemId::from("item"), &LocationId::from("loc"), &layers, 15).unwrap();
/// assert_eq!(plan.total_cost, Money::from_cents(8500));
/// ```
pub fn plan_fifo(
    item_id: &ItemId,
    location_id: &LocationId,
    candidates: &[CostLayer],
    quantity: i64,
) -> CoreResult<FifoPlan> {
    validate_quantity(quantity)?;

    let mut ordered: Vec<&CostLayer> = candidates
        .iter()
        .filter(|layer| layer.is_consumable())
        .collect();
    ordered.sort_by(|a, b| {
        a.receipt_date
            .cmp(&b.receipt_date)
            .then(a.sequence.cmp(&b.sequence))
    });

    let mut needed = quantity;
    let mut draws = Vec::new();
    let mut total_cost = Money::zero();

    for layer in ordered {
        if needed == 0 {
            break;
        }
        if &layer.item_id != item_id || &layer.location_id != location_id {
            return Err(CoreError::invariant(format!(
                "layer {} belongs to {}@{}, not {}@{}",
                layer.id, layer.item_id, layer.location_id, item_id, location_id
            )));
        }

        let take = needed.min(layer.quantity_remaining);
        let cost = layer.unit_cost.extend(take);
        draws.push(PlannedDraw {
            cost_layer_id: layer.id.clone(),
            quantity: take,
            unit_cost: layer.unit_cost,
            total_cost: cost,
        });
        total_cost += cost;
        needed -= take;
    }

    if needed > 0 {
        return Err(CoreError::InsufficientInventory {
            item_id: item_id.to_string(),
            location_id: location_id.to_string(),
            requested: quantity,
            available: quantity - needed,
        });
    }

    Ok(FifoPlan { draws, total_cost })
}

/// Groups draws by unit cost, ordered by first occurrence.
pub fn cost_groups(draws: impl IntoIterator<Item = (UnitCost, i64)>) -> Vec<(UnitCost, i64)> {
    let mut groups: Vec<(UnitCost, i64)> = Vec::new();
    for (unit_cost, quantity) in draws {
        match groups.iter_mut().find(|(cost, _)| *cost == unit_cost) {
            Some((_, total)) => *total += quantity,
            None => groups.push((unit_cost, quantity)),
        }
    }
    groups
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LayerType, QualityStatus};
    use chrono::{DateTime, Duration, Utc};

    fn item() -> ItemId {
        ItemId::from("item-1")
    }

    fn loc() -> LocationId {
        LocationId::from("loc-1")
    }

    fn layer(seq: i64, date: DateTime<Utc>, remaining: i64, cents: i64) -> CostLayer {
        CostLayer {
            id: CostLayerId::from(format!("layer-{}", seq)),
            sequence: seq,
            item_id: item(),
            location_id: loc(),
            source_reference: None,
            layer_type: LayerType::Receipt,
            quantity_received: remaining.max(1),
            quantity_remaining: remaining,
            unit_cost: UnitCost::from_cents(cents),
            original_unit_cost: UnitCost::from_cents(cents),
            landed_cost_per_unit: UnitCost::zero(),
            receipt_date: date,
            quality_status: QualityStatus::Available,
            voided: false,
            void_reason: None,
            voided_at: None,
            created_at: date,
        }
    }

    #[test]
    fn test_draws_oldest_first() {
        let t0 = Utc::now();
        let layers = vec![
            layer(2, t0 + Duration::days(4), 10, 700),
            layer(1, t0, 10, 500),
        ];

        let plan = plan_fifo(&item(), &loc(), &layers, 15).unwrap();
        assert_eq!(plan.draws.len(), 2);
        assert_eq!(plan.draws[0].cost_layer_id.as_str(), "layer-1");
        assert_eq!(plan.draws[0].quantity, 10);
        assert_eq!(plan.draws[1].cost_layer_id.as_str(), "layer-2");
        assert_eq!(plan.draws[1].quantity, 5);
        assert_eq!(plan.total_cost, Money::from_cents(8500));
        assert_eq!(plan.quantity(), 15);
    }

    #[test]
    fn test_sequence_breaks_date_ties() {
        let t0 = Utc::now();
        let layers = vec![layer(9, t0, 5, 300), layer(3, t0, 5, 100)];

        let plan = plan_fifo(&item(), &loc(), &layers, 5).unwrap();
        assert_eq!(plan.draws.len(), 1);
        assert_eq!(plan.draws[0].cost_layer_id.as_str(), "layer-3");
        assert_eq!(plan.total_cost, Money::from_cents(500));
    }

    #[test]
    fn test_insufficient_reports_what_layers_hold() {
        let t0 = Utc::now();
        let layers = vec![layer(1, t0, 10, 500), layer(2, t0, 10, 700)];

        let err = plan_fifo(&item(), &loc(), &layers, 25).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientInventory {
                item_id: "item-1".to_string(),
                location_id: "loc-1".to_string(),
                requested: 25,
                available: 20,
            }
        );
    }

    #[test]
    fn test_skips_voided_quarantined_and_empty_layers() {
        let t0 = Utc::now();
        let mut voided = layer(1, t0, 10, 100);
        voided.voided = true;
        let mut quarantined = layer(2, t0, 10, 200);
        quarantined.quality_status = QualityStatus::Quarantine;
        let empty = layer(3, t0, 0, 300);
        let good = layer(4, t0 + Duration::days(1), 10, 400);

        let plan = plan_fifo(&item(), &loc(), &[voided, quarantined, empty, good], 4).unwrap();
        assert_eq!(plan.draws.len(), 1);
        assert_eq!(plan.draws[0].cost_layer_id.as_str(), "layer-4");
        assert_eq!(plan.total_cost, Money::from_cents(1600));
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        let err = plan_fifo(&item(), &loc(), &[], 0).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_rejects_foreign_layer() {
        let mut other = layer(1, Utc::now(), 5, 100);
        other.location_id = LocationId::from("loc-2");
        let err = plan_fifo(&item(), &loc(), &[other], 1).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation(_)));
    }

    #[test]
    fn test_cost_groups_keep_first_seen_order() {
        let a = UnitCost::from_cents(500);
        let b = UnitCost::from_cents(700);
        let groups = cost_groups(vec![(a, 10), (b, 5), (a, 2)]);
        assert_eq!(groups, vec![(a, 12), (b, 5)]);
    }

    #[test]
    fn test_average_unit_cost_of_result() {
        let result = ConsumptionResult {
            total_cost: Money::from_cents(8500),
            layers_consumed: vec![
                LayerDraw {
                    consumption_id: ConsumptionId::from("c1"),
                    cost_layer_id: CostLayerId::from("l1"),
                    quantity: 10,
                    unit_cost: UnitCost::from_cents(500),
                    total_cost: Money::from_cents(5000),
                },
                LayerDraw {
                    consumption_id: ConsumptionId::from("c2"),
                    cost_layer_id: CostLayerId::from("l2"),
                    quantity: 5,
                    unit_cost: UnitCost::from_cents(700),
                    total_cost: Money::from_cents(3500),
                },
            ],
        };
        assert_eq!(result.quantity(), 15);
        assert_eq!(result.average_unit_cost(), UnitCost::from_raw(56_667));
    }
}

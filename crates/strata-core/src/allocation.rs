//! # Landed Cost Distribution
//!
//! Splits a landed cost (freight, duty, ...) over the lines of one receipt.
//!
//! ## Worked Example (by value)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Freight $20.00                                                         │
//! │                                                                         │
//! │  line   qty   unit    value    share     allocated   per unit   new     │
//! │  ────   ───   ─────   ──────   ───────   ─────────   ────────   ─────   │
//! │  A      10    $5.00   $50.00   25.00%    $5.00       +$0.50     $5.50   │
//! │  B      10    $15.00  $150.00  75.00%    $15.00      +$1.50     $16.50  │
//! │                                ───────   ─────────                      │
//! │                                100%      $20.00  (exact, B closes)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rounding is cumulative: line `i` receives
//! `round(total · cum_i / den) − round(total · cum_{i−1} / den)`. Every amount
//! is ≥ 0, and the last line closes the running sum at exactly the total.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::{div_round, Money, UnitCost};
use crate::types::{AllocationMethod, CostLayerId, ReceiptLineId};
use crate::validation::validate_landed_cost_total;

/// Basis points in 100%.
pub const FULL_SHARE_BPS: i64 = 10_000;

/// A receipt line eligible to absorb landed cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationLine {
    pub receipt_line_id: ReceiptLineId,
    pub cost_layer_id: CostLayerId,
    pub quantity: i64,
    pub unit_cost: UnitCost,
    pub weight_grams: Option<i64>,
}

/// Portion of the landed cost assigned to one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationShare {
    pub receipt_line_id: ReceiptLineId,
    pub cost_layer_id: CostLayerId,
    pub quantity: i64,
    pub amount: Money,
    pub share_bps: i64,
    /// Amount spread over the line quantity (added to the layer unit cost).
    pub unit_cost_increase: UnitCost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub requested_method: AllocationMethod,
    pub effective_method: AllocationMethod,
    pub shares: Vec<AllocationShare>,
}

impl AllocationPlan {
    /// True when weight allocation had to fall back to quantity.
    pub fn fell_back(&self) -> bool {
        self.requested_method != self.effective_method
    }

    pub fn allocated_total(&self) -> Money {
        self.shares.iter().map(|s| s.amount).sum()
    }
}

/// Method actually usable for `lines`.
///
/// Weight needs a weight on every line; otherwise quantity is used.
pub fn effective_method(method: AllocationMethod, lines: &[AllocationLine]) -> AllocationMethod {
    match method {
        AllocationMethod::Weight if lines.iter().any(|l| l.weight_grams.is_none()) => {
            AllocationMethod::Quantity
        }
        other => other,
    }
}

fn basis(method: AllocationMethod, line: &AllocationLine) -> i128 {
    match method {
        AllocationMethod::Value => line.unit_cost.raw() as i128 * line.quantity as i128,
        AllocationMethod::Quantity => line.quantity as i128,
        AllocationMethod::Weight => line.weight_grams.unwrap_or(0) as i128,
    }
}

/// Distributes `total` over `lines` by `method`.
///
/// Lines with non-positive quantity must be filtered out by the caller.
///
/// ## Errors
/// - `Validation` when `total` is not positive
/// - `Allocation` when there are no lines or the denominator is not positive
pub fn distribute_landed_cost(
    total: Money,
    method: AllocationMethod,
    lines: &[AllocationLine],
) -> CoreResult<AllocationPlan> {
    validate_landed_cost_total(total)?;

    if lines.is_empty() {
        return Err(CoreError::allocation("receipt has no layer-backed lines"));
    }
    if let Some(line) = lines.iter().find(|l| l.quantity <= 0) {
        return Err(CoreError::invariant(format!(
            "receipt line {} has non-positive quantity",
            line.receipt_line_id
        )));
    }

    let effective = effective_method(method, lines);
    let parts: Vec<i128> = lines.iter().map(|l| basis(effective, l)).collect();
    let denominator: i128 = parts.iter().sum();

    if denominator <= 0 {
        return Err(CoreError::allocation(format!(
            "total {} across receipt lines is zero",
            effective.as_str()
        )));
    }

    let total_cents = total.cents() as i128;
    let mut cumulative: i128 = 0;
    let mut assigned: i128 = 0;
    let mut shares = Vec::with_capacity(lines.len());

    for (line, part) in lines.iter().zip(parts.iter()) {
        cumulative += part;
        let running = div_round(total_cents * cumulative, denominator);
        let amount = Money::from_cents((running - assigned) as i64);
        assigned = running;

        shares.push(AllocationShare {
            receipt_line_id: line.receipt_line_id.clone(),
            cost_layer_id: line.cost_layer_id.clone(),
            quantity: line.quantity,
            amount,
            share_bps: div_round(part * FULL_SHARE_BPS as i128, denominator) as i64,
            unit_cost_increase: amount.per_unit(line.quantity),
        });
    }

    Ok(AllocationPlan {
        requested_method: method,
        effective_method: effective,
        shares,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Adjustment Orchestration
//!
//! ## Lifecycle
//! ```text
//!   create_adjustment ──► Draft ──post──► Posted ──reverse──► (new) Posted
//!                           │                                  reversal_of = original
//!                           └──discard──► Discarded
//! ```
//!
//! ## Posting A Line
//! ```text
//! quantity_change > 0   new `adjustment` layer at the line's unit cost, on_hand +Δ
//! quantity_change < 0   FIFO draw under Adjustment(id), on_hand −|Δ|
//! ```
//!
//! ## Reversing
//! The reversal is a new document with every line negated. Negated decreases
//! reverse the original's consumption records so the same layers and costs
//! come back; negated increases draw FIFO like any decrease.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;

use super::{consume_in, create_layer_in, reverse_draw_in, InventoryLedger};
use crate::error::DbResult;
use crate::repository::{adjustment, catalog, consumption};
use strata_core::validation::{
    validate_line_count, validate_quantity_change, validate_reason, validate_unique_items,
    validate_unit_cost,
};
use strata_core::workflow::{ensure_reversible, transition_adjustment, AdjustmentAction};
use strata_core::{
    Adjustment, AdjustmentId, AdjustmentStatus, CoreError, LayerType, LocationId, Money,
    NewAdjustmentLine, NewCostLayer, QualityStatus, TransactionRef, ValidationError,
};

fn validate_lines(lines: &[NewAdjustmentLine]) -> DbResult<()> {
    validate_line_count(lines.len())?;
    validate_unique_items(lines.iter().map(|l| &l.item_id))?;

    for line in lines {
        validate_quantity_change(line.quantity_change)?;
        match (line.quantity_change > 0, line.unit_cost) {
            (true, Some(cost)) => validate_unit_cost(cost)?,
            (true, None) => return Err(ValidationError::required("unit_cost").into()),
            (false, Some(_)) => {
                return Err(ValidationError::not_allowed(
                    "unit_cost",
                    "decreases are costed FIFO",
                )
                .into())
            }
            (false, None) => {}
        }
    }

    Ok(())
}

/// Applies every line of a draft and marks it posted.
async fn post_in(
    conn: &mut SqliteConnection,
    draft: &Adjustment,
    now: DateTime<Utc>,
) -> DbResult<Adjustment> {
    let next = transition_adjustment(draft, AdjustmentAction::Post)?;
    let transaction = TransactionRef::Adjustment(draft.id.clone());

    catalog::require_active_location(conn, &draft.location_id).await?;
    for line in &draft.lines {
        catalog::require_active_item(conn, &line.item_id).await?;
    }

    for line in &draft.lines {
        let total = if line.quantity_change > 0 {
            let unit_cost = line
                .unit_cost
                .ok_or_else(|| CoreError::invariant(format!("increase line {} has no unit cost", line.id)))?;
            let layer = NewCostLayer {
                item_id: line.item_id.clone(),
                location_id: draft.location_id.clone(),
                quantity: line.quantity_change,
                unit_cost,
                receipt_date: now,
                layer_type: LayerType::Adjustment,
                source_reference: Some(draft.id.to_string()),
                quality_status: QualityStatus::Available,
            };
            let created = create_layer_in(conn, &layer, now).await?;
            created.unit_cost.extend(created.quantity_received)
        } else {
            let drawn = consume_in(
                conn,
                &line.item_id,
                &draft.location_id,
                -line.quantity_change,
                &transaction,
                now,
            )
            .await?;
            -drawn.total_cost
        };
        adjustment::set_line_total(conn, &line.id, total).await?;
    }

    adjustment::set_status(conn, &draft.id, draft.status, next, now).await?;
    adjustment::require(conn, &draft.id).await
}

impl InventoryLedger {
    /// Creates a draft adjustment. Nothing moves until it is posted.
    ///
    /// Increases need a unit cost; decreases are costed FIFO when posted.
    pub async fn create_adjustment(
        &self,
        location_id: &LocationId,
        reason: &str,
        lines: Vec<NewAdjustmentLine>,
    ) -> DbResult<Adjustment> {
        validate_reason(reason)?;
        validate_lines(&lines)?;

        let mut tx = self.db.begin_write().await?;

        catalog::require_active_location(&mut tx, location_id).await?;
        for line in &lines {
            catalog::require_active_item(&mut tx, &line.item_id).await?;
        }
        let draft = adjustment::insert(&mut tx, location_id, reason.trim(), None, &lines, Utc::now())
            .await?;

        tx.commit().await?;

        info!(
            adjustment_id = %draft.id,
            location_id = %location_id,
            lines = draft.lines.len(),
            "Adjustment drafted"
        );
        Ok(draft)
    }

    /// Posts a draft: every line moves stock, or none does.
    pub async fn post_adjustment(&self, id: &AdjustmentId) -> DbResult<Adjustment> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let draft = adjustment::require(&mut tx, id).await?;
        let posted = post_in(&mut tx, &draft, now).await?;

        tx.commit().await?;

        let net: Money = posted.lines.iter().filter_map(|l| l.total_cost).sum();
        info!(
            adjustment_id = %id,
            lines = posted.lines.len(),
            net_cost = %net,
            "Adjustment posted"
        );
        Ok(posted)
    }

    pub async fn discard_adjustment(&self, id: &AdjustmentId) -> DbResult<Adjustment> {
        let mut tx = self.db.begin_write().await?;

        let draft = adjustment::require(&mut tx, id).await?;
        let next = transition_adjustment(&draft, AdjustmentAction::Discard)?;
        adjustment::set_status(&mut tx, id, draft.status, next, Utc::now()).await?;
        let discarded = adjustment::require(&mut tx, id).await?;

        tx.commit().await?;

        info!(adjustment_id = %id, "Adjustment discarded");
        Ok(discarded)
    }

    /// Creates and posts the mirror image of a posted adjustment.
    ///
    /// ## Errors
    /// - `InvalidTransition` when `id` is not posted, is itself a reversal,
    ///   or was already reversed
    /// - `InsufficientInventory` when units added by the original have since
    ///   been consumed
    pub async fn reverse_adjustment(&self, id: &AdjustmentId) -> DbResult<Adjustment> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let original = adjustment::require(&mut tx, id).await?;
        let already_reversed = adjustment::reversal_of(&mut tx, id).await?.is_some();
        ensure_reversible(&original, already_reversed)?;

        let mirrored: Vec<NewAdjustmentLine> = original
            .lines
            .iter()
            .map(|line| {
                if line.quantity_change > 0 {
                    NewAdjustmentLine::decrease(line.item_id.clone(), line.quantity_change)
                } else {
                    let quantity = -line.quantity_change;
                    let released = line.total_cost.map(|t| t.abs()).unwrap_or_default();
                    NewAdjustmentLine::increase(
                        line.item_id.clone(),
                        quantity,
                        released.per_unit(quantity),
                    )
                }
            })
            .collect();

        let reason = format!("reversal of {}", original.id);
        let draft = adjustment::insert(
            &mut tx,
            &original.location_id,
            &reason,
            Some(&original.id),
            &mirrored,
            now,
        )
        .await?;

        let original_txn = TransactionRef::Adjustment(original.id.clone());
        let reversing_txn = TransactionRef::Adjustment(draft.id.clone());

        for line in &draft.lines {
            let total = if line.quantity_change > 0 {
                let draws = consumption::open_draws(&mut tx, &original_txn, &line.item_id).await?;
                let restored: i64 = draws.iter().map(|d| d.quantity).sum();
                if restored != line.quantity_change {
                    return Err(CoreError::invariant(format!(
                        "adjustment {} drew {} units of {}, line expects {}",
                        original.id, restored, line.item_id, line.quantity_change
                    ))
                    .into());
                }

                let mut total = Money::zero();
                for draw in &draws {
                    let reversed = reverse_draw_in(&mut tx, &draw.id, &reversing_txn, now).await?;
                    total += reversed.total_cost();
                }
                total
            } else {
                let drawn = consume_in(
                    &mut tx,
                    &line.item_id,
                    &draft.location_id,
                    -line.quantity_change,
                    &reversing_txn,
                    now,
                )
                .await?;
                -drawn.total_cost
            };
            adjustment::set_line_total(&mut tx, &line.id, total).await?;
        }

        adjustment::set_status(
            &mut tx,
            &draft.id,
            AdjustmentStatus::Draft,
            AdjustmentStatus::Posted,
            now,
        )
        .await?;
        let reversal = adjustment::require(&mut tx, &draft.id).await?;

        tx.commit().await?;

        info!(
            adjustment_id = %id,
            reversal_id = %reversal.id,
            lines = reversal.lines.len(),
            "Adjustment reversed"
        );
        Ok(reversal)
    }

    pub async fn adjustment(&self, id: &AdjustmentId) -> DbResult<Option<Adjustment>> {
        let mut conn = self.db.pool().acquire().await?;
        adjustment::get(&mut conn, id).await
    }
}

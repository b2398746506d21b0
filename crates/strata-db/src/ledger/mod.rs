//! # Inventory Ledger
//!
//! Units of work over the repositories. Every public mutating method opens
//! one write transaction, composes repository calls on it, and commits.
//!
//! ## Unit Of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       One Ledger Operation                              │
//! │                                                                         │
//! │  begin_write()  ── UPDATE ledger_write_lock (RESERVED lock taken)      │
//! │       │                                                                 │
//! │       ├── validate inputs, resolve items / locations                   │
//! │       ├── layer change      (cost_layer / consumption)                 │
//! │       ├── balance delta     (balance::apply_delta)                     │
//! │       ├── average refresh   (balance::refresh_average_cost)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  commit()   ── or any `?` drops the transaction → rollback             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Layer/Balance Invariant
//! For every (item, location) at commit:
//!
//! ```text
//! Σ quantity_remaining (non-voided, available layers) == Σ on_hand (balance rows)
//! ```
//!
//! Layer-driven on-hand changes always land on the location-level balance
//! row (no bin). [`InventoryLedger::reconcile`] checks the invariant.

mod adjustments;
mod transfers;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::consumption::ConsumptionReversal;
use crate::repository::landed_cost::AppliedShare;
use crate::repository::receipt::StoredLine;
use crate::repository::{balance, catalog, consumption, cost_layer, landed_cost, receipt};
use strata_core::allocation::{distribute_landed_cost, AllocationLine};
use strata_core::balance::layer_quantity;
use strata_core::validation::{
    validate_line_count, validate_reason, validate_unit_cost, validate_weight,
};
use strata_core::{
    AllocationMethod, BinId, ConsumptionId, ConsumptionResult, CoreError, CostCategory, CostLayer,
    CostLayerId, InventoryBalance, ItemId, ItemReceipt, LandedCost, LayerConsumption,
    LayerCostRevision, LayerType, LocationId, Money, NewCostLayer, NewReceipt, QualityStatus,
    QuantityClass, ReceiptId, ReceiptLineId, ReconciliationReport, TransactionRef, UnitCost, ValidationError,
};

/// Outcome of reversing one consumption through the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversedDraw {
    pub reversal: ConsumptionReversal,
    /// Fresh adjustment layer holding the returned units, when the original
    /// layer could not take them back.
    pub replacement_layer: Option<CostLayer>,
}

impl ReversedDraw {
    pub fn quantity(&self) -> i64 {
        self.reversal.original.quantity
    }

    pub fn total_cost(&self) -> Money {
        self.reversal.original.total_cost
    }
}

/// Entry point for every costing operation.
///
/// ## Usage
/// ```rust,ignore
/// let ledger = db.ledger();
/// let receipt = ledger.receive_items(new_receipt).await?;
/// ledger
///     .apply_landed_cost(&receipt.id, CostCategory::Freight, Money::from_cents(2000), AllocationMethod::Value)
///     .await?;
/// let drawn = ledger
///     .consume_layers_fifo(&item, &location, 15, TransactionRef::Fulfillment(order_id))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    db: Database,
}

// =============================================================================
// In-Transaction Building Blocks
// =============================================================================

/// Inserts a layer and books its on-hand (when available) in `conn`.
pub(crate) async fn create_layer_in(
    conn: &mut SqliteConnection,
    layer: &NewCostLayer,
    now: DateTime<Utc>,
) -> DbResult<CostLayer> {
    let created = cost_layer::insert(conn, layer, now).await?;

    if created.counts_on_hand() {
        balance::apply_delta(
            conn,
            &created.item_id,
            &created.location_id,
            None,
            QuantityClass::OnHand,
            created.quantity_received,
            now,
        )
        .await?;
    }
    balance::refresh_average_cost(conn, &created.item_id, &created.location_id, now).await?;

    Ok(created)
}

/// FIFO draw plus the matching on-hand decrease.
pub(crate) async fn consume_in(
    conn: &mut SqliteConnection,
    item_id: &ItemId,
    location_id: &LocationId,
    quantity: i64,
    transaction: &TransactionRef,
    now: DateTime<Utc>,
) -> DbResult<ConsumptionResult> {
    let result =
        consumption::consume_fifo(conn, item_id, location_id, quantity, transaction, now).await?;

    balance::apply_delta(
        conn,
        item_id,
        location_id,
        None,
        QuantityClass::OnHand,
        -quantity,
        now,
    )
    .await?;
    balance::refresh_average_cost(conn, item_id, location_id, now).await?;

    Ok(result)
}

/// Reverses one draw and puts its units back on hand.
///
/// Units that the original layer cannot take back are re-created as an
/// adjustment layer at the consumed unit cost.
pub(crate) async fn reverse_draw_in(
    conn: &mut SqliteConnection,
    consumption_id: &ConsumptionId,
    reversing: &TransactionRef,
    now: DateTime<Utc>,
) -> DbResult<ReversedDraw> {
    let reversal = consumption::reverse(conn, consumption_id, reversing, now).await?;
    let quantity = reversal.original.quantity;
    let item_id = reversal.layer.item_id.clone();
    let location_id = reversal.layer.location_id.clone();

    let replacement_layer = if reversal.restored {
        balance::apply_delta(
            conn,
            &item_id,
            &location_id,
            None,
            QuantityClass::OnHand,
            quantity,
            now,
        )
        .await?;
        balance::refresh_average_cost(conn, &item_id, &location_id, now).await?;
        None
    } else {
        warn!(
            consumption_id = %consumption_id,
            cost_layer_id = %reversal.layer.id,
            quantity,
            "Original layer cannot take units back, re-layering"
        );
        let replacement = NewCostLayer {
            item_id,
            location_id,
            quantity,
            unit_cost: reversal.original.unit_cost,
            receipt_date: now,
            layer_type: LayerType::Adjustment,
            source_reference: Some(reversal.original.id.to_string()),
            quality_status: QualityStatus::Available,
        };
        Some(create_layer_in(conn, &replacement, now).await?)
    };

    Ok(ReversedDraw {
        reversal,
        replacement_layer,
    })
}

async fn require_active_pair(
    conn: &mut SqliteConnection,
    item_id: &ItemId,
    location_id: &LocationId,
) -> DbResult<()> {
    catalog::require_active_item(conn, item_id).await?;
    catalog::require_active_location(conn, location_id).await?;
    Ok(())
}

fn voided_layer_error(layer: &CostLayer, action: &str) -> CoreError {
    ValidationError::not_allowed(
        "cost_layer",
        format!("layer {} is voided and cannot {}", layer.id, action),
    )
    .into()
}

impl InventoryLedger {
    pub fn new(db: Database) -> Self {
        InventoryLedger { db }
    }

    // =========================================================================
    // Layers And Consumption
    // =========================================================================

    /// Creates a cost layer and books its on-hand.
    pub async fn create_layer(&self, layer: NewCostLayer) -> DbResult<CostLayer> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        require_active_pair(&mut tx, &layer.item_id, &layer.location_id).await?;
        let created = create_layer_in(&mut tx, &layer, now).await?;

        tx.commit().await?;

        info!(
            cost_layer_id = %created.id,
            item_id = %created.item_id,
            location_id = %created.location_id,
            quantity = created.quantity_received,
            unit_cost = %created.unit_cost,
            "Cost layer created"
        );
        Ok(created)
    }

    /// Draws `quantity` FIFO and lowers on-hand by the same amount.
    pub async fn consume_layers_fifo(
        &self,
        item_id: &ItemId,
        location_id: &LocationId,
        quantity: i64,
        transaction: TransactionRef,
    ) -> DbResult<ConsumptionResult> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        require_active_pair(&mut tx, item_id, location_id).await?;
        let result = consume_in(&mut tx, item_id, location_id, quantity, &transaction, now).await?;

        tx.commit().await?;

        info!(
            item_id = %item_id,
            location_id = %location_id,
            transaction = %transaction,
            quantity,
            total_cost = %result.total_cost,
            layers = result.layers_consumed.len(),
            "FIFO consumption committed"
        );
        Ok(result)
    }

    /// Reverses one consumption record and returns its units to on-hand.
    pub async fn reverse_consumption(
        &self,
        consumption_id: &ConsumptionId,
        reversing: TransactionRef,
    ) -> DbResult<ReversedDraw> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let reversed = reverse_draw_in(&mut tx, consumption_id, &reversing, now).await?;

        tx.commit().await?;

        info!(
            consumption_id = %consumption_id,
            reversal_id = %reversed.reversal.reversal.id,
            transaction = %reversing,
            quantity = reversed.quantity(),
            restored = reversed.reversal.restored,
            "Consumption reversed"
        );
        Ok(reversed)
    }

    // =========================================================================
    // Receipts And Landed Cost
    // =========================================================================

    /// Records a purchase receipt: one layer per accepted line.
    ///
    /// Lines accepting zero units are stored without a layer.
    pub async fn receive_items(&self, new_receipt: NewReceipt) -> DbResult<ItemReceipt> {
        validate_line_count(new_receipt.lines.len())?;
        for line in &new_receipt.lines {
            if line.quantity_accepted < 0 {
                return Err(ValidationError::must_not_be_negative("quantity_accepted").into());
            }
            validate_unit_cost(line.unit_cost)?;
            validate_weight(line.weight_grams)?;
        }

        let now = Utc::now();
        let receipt_id = ReceiptId::generate();
        let mut tx = self.db.begin_write().await?;

        catalog::require_active_location(&mut tx, &new_receipt.location_id).await?;

        let mut stored = Vec::with_capacity(new_receipt.lines.len());
        for line in &new_receipt.lines {
            catalog::require_active_item(&mut tx, &line.item_id).await?;

            let line_id = ReceiptLineId::generate();
            let cost_layer_id = if line.quantity_accepted > 0 {
                let layer = NewCostLayer {
                    item_id: line.item_id.clone(),
                    location_id: new_receipt.location_id.clone(),
                    quantity: line.quantity_accepted,
                    unit_cost: line.unit_cost,
                    receipt_date: new_receipt.received_at,
                    layer_type: LayerType::Receipt,
                    source_reference: Some(line_id.to_string()),
                    quality_status: line.quality_status,
                };
                Some(create_layer_in(&mut tx, &layer, now).await?.id)
            } else {
                None
            };

            stored.push(StoredLine {
                id: line_id,
                item_id: line.item_id.clone(),
                quantity_accepted: line.quantity_accepted,
                unit_cost: line.unit_cost,
                weight_grams: line.weight_grams,
                quality_status: line.quality_status,
                cost_layer_id,
            });
        }

        let receipt = receipt::insert(
            &mut tx,
            &receipt_id,
            &new_receipt.location_id,
            new_receipt.reference.as_deref(),
            new_receipt.received_at,
            &stored,
            now,
        )
        .await?;

        tx.commit().await?;

        info!(
            receipt_id = %receipt.id,
            location_id = %receipt.location_id,
            lines = receipt.lines.len(),
            "Items received"
        );
        Ok(receipt)
    }

    /// Spreads `total_cost` over the receipt's layer-backed lines and raises
    /// each layer's unit cost by its share.
    ///
    /// ## Errors
    /// - `Validation` when `total_cost` is not positive
    /// - `Allocation` when no line can carry cost; nothing is written
    pub async fn apply_landed_cost(
        &self,
        receipt_id: &ReceiptId,
        category: CostCategory,
        total_cost: Money,
        method: AllocationMethod,
    ) -> DbResult<LandedCost> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let receipt = receipt::require(&mut tx, receipt_id).await?;

        let mut lines = Vec::with_capacity(receipt.lines.len());
        for line in &receipt.lines {
            let layer_id = match &line.cost_layer_id {
                Some(id) if line.quantity_accepted > 0 => id,
                _ => continue,
            };
            let layer = cost_layer::require(&mut tx, layer_id).await?;
            if layer.voided {
                debug!(cost_layer_id = %layer.id, "Skipping voided layer in allocation");
                continue;
            }
            lines.push(AllocationLine {
                receipt_line_id: line.id.clone(),
                cost_layer_id: layer.id,
                quantity: line.quantity_accepted,
                unit_cost: line.unit_cost,
                weight_grams: line.weight_grams,
            });
        }

        let plan = distribute_landed_cost(total_cost, method, &lines)?;
        if plan.fell_back() {
            warn!(
                receipt_id = %receipt_id,
                requested = plan.requested_method.as_str(),
                effective = plan.effective_method.as_str(),
                "Receipt lines lack weight, allocating by quantity"
            );
        }

        let mut applied = Vec::with_capacity(plan.shares.len());
        for share in &plan.shares {
            let before = cost_layer::require(&mut tx, &share.cost_layer_id).await?.unit_cost;
            cost_layer::raise_unit_cost(&mut tx, &share.cost_layer_id, share.unit_cost_increase)
                .await?;
            applied.push(AppliedShare {
                original_unit_cost: before,
                adjusted_unit_cost: before + share.unit_cost_increase,
            });
        }

        let landed =
            landed_cost::insert(&mut tx, receipt_id, category, total_cost, &plan, &applied, now)
                .await?;

        let mut items: Vec<&ItemId> = receipt.lines.iter().map(|l| &l.item_id).collect();
        items.sort();
        items.dedup();
        for item_id in items {
            balance::refresh_average_cost(&mut tx, item_id, &receipt.location_id, now).await?;
        }

        tx.commit().await?;

        info!(
            landed_cost_id = %landed.id,
            receipt_id = %receipt_id,
            total_cost = %total_cost,
            method = landed.effective_method.as_str(),
            allocations = landed.allocations.len(),
            "Landed cost applied"
        );
        Ok(landed)
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// Applies a signed delta to one quantity class of a balance row.
    ///
    /// On-hand and in-transit follow the layers and are rejected here; they
    /// move through receipts, draws, adjustments and transfers.
    pub async fn apply_balance_delta(
        &self,
        item_id: &ItemId,
        location_id: &LocationId,
        bin_id: Option<&BinId>,
        class: QuantityClass,
        delta: i64,
    ) -> DbResult<InventoryBalance> {
        if class.is_layer_driven() {
            return Err(ValidationError::not_allowed(
                class.as_str(),
                "moves only with cost layers",
            )
            .into());
        }

        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let updated =
            balance::apply_delta(&mut tx, item_id, location_id, bin_id, class, delta, now).await?;

        tx.commit().await?;

        info!(
            item_id = %item_id,
            location_id = %location_id,
            class = %class,
            delta,
            available = updated.available,
            "Balance updated"
        );
        Ok(updated)
    }

    pub async fn refresh_average_cost(
        &self,
        item_id: &ItemId,
        location_id: &LocationId,
    ) -> DbResult<InventoryBalance> {
        let mut tx = self.db.begin_write().await?;
        let refreshed =
            balance::refresh_average_cost(&mut tx, item_id, location_id, Utc::now()).await?;
        tx.commit().await?;
        Ok(refreshed)
    }

    // =========================================================================
    // Administrative Overrides
    // =========================================================================

    /// Voids a layer. Remaining available units are written off on-hand.
    pub async fn void_layer(&self, layer_id: &CostLayerId, reason: &str) -> DbResult<CostLayer> {
        validate_reason(reason)?;

        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let layer = cost_layer::require(&mut tx, layer_id).await?;
        if layer.voided {
            warn!(cost_layer_id = %layer_id, "Rejected void of voided layer");
            return Err(voided_layer_error(&layer, "be voided again").into());
        }

        let written_off = if layer.counts_on_hand() {
            layer.quantity_remaining
        } else {
            0
        };
        if written_off > 0 {
            balance::apply_delta(
                &mut tx,
                &layer.item_id,
                &layer.location_id,
                None,
                QuantityClass::OnHand,
                -written_off,
                now,
            )
            .await?;
        }

        cost_layer::void(&mut tx, layer_id, reason.trim(), now).await?;
        balance::refresh_average_cost(&mut tx, &layer.item_id, &layer.location_id, now).await?;
        let voided = cost_layer::require(&mut tx, layer_id).await?;

        tx.commit().await?;

        info!(
            cost_layer_id = %layer_id,
            written_off,
            reason = reason.trim(),
            "Cost layer voided"
        );
        Ok(voided)
    }

    /// Replaces a layer's unit cost and records the revision.
    pub async fn adjust_layer_cost(
        &self,
        layer_id: &CostLayerId,
        new_unit_cost: UnitCost,
        reason: &str,
    ) -> DbResult<LayerCostRevision> {
        validate_unit_cost(new_unit_cost)?;
        validate_reason(reason)?;

        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let layer = cost_layer::require(&mut tx, layer_id).await?;
        if layer.voided {
            warn!(cost_layer_id = %layer_id, "Rejected revaluation of voided layer");
            return Err(voided_layer_error(&layer, "be revalued").into());
        }

        cost_layer::set_unit_cost(&mut tx, layer_id, new_unit_cost).await?;
        let revision = landed_cost::insert_revision(
            &mut tx,
            layer_id,
            layer.unit_cost,
            new_unit_cost,
            reason.trim(),
            now,
        )
        .await?;
        balance::refresh_average_cost(&mut tx, &layer.item_id, &layer.location_id, now).await?;

        tx.commit().await?;

        info!(
            cost_layer_id = %layer_id,
            previous = %layer.unit_cost,
            new = %new_unit_cost,
            "Layer cost adjusted"
        );
        Ok(revision)
    }

    /// Moves a layer between quality statuses, booking the on-hand change
    /// when it enters or leaves `available`.
    pub async fn change_layer_quality(
        &self,
        layer_id: &CostLayerId,
        status: QualityStatus,
    ) -> DbResult<CostLayer> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let layer = cost_layer::require(&mut tx, layer_id).await?;
        if layer.voided {
            warn!(cost_layer_id = %layer_id, "Rejected quality change of voided layer");
            return Err(voided_layer_error(&layer, "change quality").into());
        }
        if layer.quality_status == status {
            return Ok(layer);
        }

        let was_available = layer.quality_status.is_consumable();
        let delta = match (was_available, status.is_consumable()) {
            (true, false) => -layer.quantity_remaining,
            (false, true) => layer.quantity_remaining,
            _ => 0,
        };

        cost_layer::set_quality(&mut tx, layer_id, status).await?;
        if delta != 0 {
            balance::apply_delta(
                &mut tx,
                &layer.item_id,
                &layer.location_id,
                None,
                QuantityClass::OnHand,
                delta,
                now,
            )
            .await?;
        }
        balance::refresh_average_cost(&mut tx, &layer.item_id, &layer.location_id, now).await?;
        let changed = cost_layer::require(&mut tx, layer_id).await?;

        tx.commit().await?;

        info!(
            cost_layer_id = %layer_id,
            from = %layer.quality_status,
            to = %status,
            on_hand_delta = delta,
            "Layer quality changed"
        );
        Ok(changed)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Σ remaining × unit cost over non-voided layers, any quality status.
    pub async fn total_inventory_value(
        &self,
        item_id: Option<&ItemId>,
        location_id: Option<&LocationId>,
    ) -> DbResult<Money> {
        let mut conn = self.db.pool().acquire().await?;
        let layers = cost_layer::valued(&mut conn, item_id, location_id).await?;
        Ok(layers.iter().map(|layer| layer.remaining_value()).sum())
    }

    pub async fn balance(
        &self,
        item_id: &ItemId,
        location_id: &LocationId,
        bin_id: Option<&BinId>,
    ) -> DbResult<Option<InventoryBalance>> {
        let mut conn = self.db.pool().acquire().await?;
        balance::get(&mut conn, item_id, location_id, bin_id).await
    }

    /// Location-level row first, then one row per bin.
    pub async fn balances(
        &self,
        item_id: &ItemId,
        location_id: &LocationId,
    ) -> DbResult<Vec<InventoryBalance>> {
        let mut conn = self.db.pool().acquire().await?;
        balance::list_for_pair(&mut conn, item_id, location_id).await
    }

    /// Every layer of the pair in FIFO order, voided and exhausted included.
    pub async fn layers(
        &self,
        item_id: &ItemId,
        location_id: &LocationId,
    ) -> DbResult<Vec<CostLayer>> {
        let mut conn = self.db.pool().acquire().await?;
        cost_layer::list(&mut conn, item_id, location_id).await
    }

    pub async fn layer(&self, layer_id: &CostLayerId) -> DbResult<Option<CostLayer>> {
        let mut conn = self.db.pool().acquire().await?;
        cost_layer::get(&mut conn, layer_id).await
    }

    pub async fn consumptions_for(
        &self,
        transaction: &TransactionRef,
    ) -> DbResult<Vec<LayerConsumption>> {
        let mut conn = self.db.pool().acquire().await?;
        consumption::for_transaction(&mut conn, transaction).await
    }

    pub async fn consumptions_for_layer(
        &self,
        layer_id: &CostLayerId,
    ) -> DbResult<Vec<LayerConsumption>> {
        let mut conn = self.db.pool().acquire().await?;
        consumption::for_layer(&mut conn, layer_id).await
    }

    pub async fn receipt(&self, receipt_id: &ReceiptId) -> DbResult<Option<ItemReceipt>> {
        let mut conn = self.db.pool().acquire().await?;
        receipt::get(&mut conn, receipt_id).await
    }

    pub async fn landed_costs_for_receipt(
        &self,
        receipt_id: &ReceiptId,
    ) -> DbResult<Vec<LandedCost>> {
        let mut conn = self.db.pool().acquire().await?;
        landed_cost::for_receipt(&mut conn, receipt_id).await
    }

    pub async fn cost_revisions(&self, layer_id: &CostLayerId) -> DbResult<Vec<LayerCostRevision>> {
        let mut conn = self.db.pool().acquire().await?;
        landed_cost::revisions_for_layer(&mut conn, layer_id).await
    }

    /// Compares layer remainders with the pair's on-hand.
    pub async fn reconcile(
        &self,
        item_id: &ItemId,
        location_id: &LocationId,
    ) -> DbResult<ReconciliationReport> {
        let mut conn = self.db.pool().acquire().await?;
        let layers = cost_layer::list(&mut conn, item_id, location_id).await?;
        let on_hand = balance::on_hand_total(&mut conn, item_id, location_id).await?;

        let layer_quantity = layer_quantity(&layers);
        let report = ReconciliationReport {
            item_id: item_id.clone(),
            location_id: location_id.clone(),
            layer_quantity,
            on_hand,
            in_sync: layer_quantity == on_hand,
        };

        if !report.in_sync {
            warn!(
                item_id = %item_id,
                location_id = %location_id,
                layer_quantity,
                on_hand,
                "Layers and balance disagree"
            );
        }
        Ok(report)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

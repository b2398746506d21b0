//! # Transfer Orchestration
//!
//! ## Lifecycle
//! ```text
//!                ship                  receive
//!   Pending ─────────────► InTransit ─────────────► Received
//!      │                       │
//!      └──────cancel───────────┴──────► Cancelled
//! ```
//!
//! ## Quantity Movement Per Line
//! ```text
//!               source on_hand   source in_transit   destination on_hand
//! ship              −q                 +q
//! receive                              −q                  +q
//! cancel (IT)       +q                 −q
//! ```
//! Shipping draws FIFO at the source under `Transfer(id)`. Receiving creates
//! one `transfer_in` layer per distinct shipped unit cost, so FIFO cost moves
//! with the goods.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;

use super::{consume_in, create_layer_in, reverse_draw_in, InventoryLedger};
use crate::error::DbResult;
use crate::repository::{balance, catalog, consumption, transfer};
use strata_core::fifo::cost_groups;
use strata_core::validation::{
    validate_distinct_locations, validate_line_count, validate_quantity, validate_unique_items,
};
use strata_core::workflow::{transition_transfer, TransferAction};
use strata_core::{
    CoreError, LayerConsumption, LayerType, LocationId, NewCostLayer, NewTransferLine,
    QualityStatus, QuantityClass, TransactionRef, Transfer, TransferId, TransferLine,
    TransferStatus,
};

async fn shipped_draws(
    conn: &mut SqliteConnection,
    transfer: &Transfer,
    line: &TransferLine,
) -> DbResult<Vec<LayerConsumption>> {
    let transaction = TransactionRef::Transfer(transfer.id.clone());
    let draws = consumption::open_draws(conn, &transaction, &line.item_id).await?;

    let shipped: i64 = draws.iter().map(|d| d.quantity).sum();
    if shipped != line.quantity {
        return Err(CoreError::invariant(format!(
            "transfer {} line {} shipped {} units, expected {}",
            transfer.id, line.line_number, shipped, line.quantity
        ))
        .into());
    }

    Ok(draws)
}

async fn move_in_transit(
    conn: &mut SqliteConnection,
    transfer: &Transfer,
    line: &TransferLine,
    delta: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    balance::apply_delta(
        conn,
        &line.item_id,
        &transfer.source_location_id,
        None,
        QuantityClass::InTransit,
        delta,
        now,
    )
    .await?;
    Ok(())
}

impl InventoryLedger {
    pub async fn create_transfer(
        &self,
        source_location_id: &LocationId,
        destination_location_id: &LocationId,
        lines: Vec<NewTransferLine>,
    ) -> DbResult<Transfer> {
        validate_distinct_locations(source_location_id, destination_location_id)?;
        validate_line_count(lines.len())?;
        validate_unique_items(lines.iter().map(|l| &l.item_id))?;
        for line in &lines {
            validate_quantity(line.quantity)?;
        }

        let mut tx = self.db.begin_write().await?;

        catalog::require_active_location(&mut tx, source_location_id).await?;
        catalog::require_active_location(&mut tx, destination_location_id).await?;
        for line in &lines {
            catalog::require_active_item(&mut tx, &line.item_id).await?;
        }
        let created = transfer::insert(
            &mut tx,
            source_location_id,
            destination_location_id,
            &lines,
            Utc::now(),
        )
        .await?;

        tx.commit().await?;

        info!(
            transfer_id = %created.id,
            source = %source_location_id,
            destination = %destination_location_id,
            lines = created.lines.len(),
            "Transfer created"
        );
        Ok(created)
    }

    /// Draws every line FIFO at the source and puts it in transit.
    pub async fn ship_transfer(&self, id: &TransferId) -> DbResult<Transfer> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let pending = transfer::require(&mut tx, id).await?;
        let next = transition_transfer(&pending, TransferAction::Ship)?;
        let transaction = TransactionRef::Transfer(id.clone());

        catalog::require_active_location(&mut tx, &pending.source_location_id).await?;
        for line in &pending.lines {
            catalog::require_active_item(&mut tx, &line.item_id).await?;
        }

        for line in &pending.lines {
            let drawn = consume_in(
                &mut tx,
                &line.item_id,
                &pending.source_location_id,
                line.quantity,
                &transaction,
                now,
            )
            .await?;
            move_in_transit(&mut tx, &pending, line, line.quantity, now).await?;
            transfer::set_shipped_cost(&mut tx, &line.id, drawn.total_cost).await?;
        }

        transfer::set_status(&mut tx, id, pending.status, next, now).await?;
        let shipped = transfer::require(&mut tx, id).await?;

        tx.commit().await?;

        info!(transfer_id = %id, lines = shipped.lines.len(), "Transfer shipped");
        Ok(shipped)
    }

    /// Lands every line at the destination at its shipped FIFO cost.
    pub async fn receive_transfer(&self, id: &TransferId) -> DbResult<Transfer> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let in_transit = transfer::require(&mut tx, id).await?;
        let next = transition_transfer(&in_transit, TransferAction::Receive)?;

        catalog::require_active_location(&mut tx, &in_transit.destination_location_id).await?;
        for line in &in_transit.lines {
            catalog::require_active_item(&mut tx, &line.item_id).await?;
        }

        for line in &in_transit.lines {
            let draws = shipped_draws(&mut tx, &in_transit, line).await?;

            for (unit_cost, quantity) in cost_groups(draws.iter().map(|d| (d.unit_cost, d.quantity))) {
                let layer = NewCostLayer {
                    item_id: line.item_id.clone(),
                    location_id: in_transit.destination_location_id.clone(),
                    quantity,
                    unit_cost,
                    receipt_date: now,
                    layer_type: LayerType::TransferIn,
                    source_reference: Some(id.to_string()),
                    quality_status: QualityStatus::Available,
                };
                create_layer_in(&mut tx, &layer, now).await?;
            }
            move_in_transit(&mut tx, &in_transit, line, -line.quantity, now).await?;
        }

        transfer::set_status(&mut tx, id, in_transit.status, next, now).await?;
        let received = transfer::require(&mut tx, id).await?;

        tx.commit().await?;

        info!(transfer_id = %id, lines = received.lines.len(), "Transfer received");
        Ok(received)
    }

    /// Cancels before receipt. Shipped units go back into their source layers.
    pub async fn cancel_transfer(&self, id: &TransferId) -> DbResult<Transfer> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let open = transfer::require(&mut tx, id).await?;
        let next = transition_transfer(&open, TransferAction::Cancel)?;

        if open.status == TransferStatus::InTransit {
            let transaction = TransactionRef::Transfer(id.clone());
            for line in &open.lines {
                for draw in shipped_draws(&mut tx, &open, line).await? {
                    reverse_draw_in(&mut tx, &draw.id, &transaction, now).await?;
                }
                move_in_transit(&mut tx, &open, line, -line.quantity, now).await?;
            }
        }

        transfer::set_status(&mut tx, id, open.status, next, now).await?;
        let cancelled = transfer::require(&mut tx, id).await?;

        tx.commit().await?;

        info!(transfer_id = %id, was = %open.status, "Transfer cancelled");
        Ok(cancelled)
    }

    pub async fn transfer(&self, id: &TransferId) -> DbResult<Option<Transfer>> {
        let mut conn = self.db.pool().acquire().await?;
        transfer::get(&mut conn, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{fixture, layer_input};
    use crate::error::ErrorClass;
    use chrono::{Duration, Utc};
    use strata_core::{
        CoreError, LayerType, Money, NewTransferLine, TransactionRef, TransferStatus, UnitCost,
    };

    fn line(item: &strata_core::ItemId, quantity: i64) -> NewTransferLine {
        NewTransferLine {
            item_id: item.clone(),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_full_transfer_carries_fifo_cost() {
        let f = fixture().await;
        let t0 = Utc::now() - Duration::days(5);
        f.ledger
            .create_layer(layer_input(&f.item, &f.main, 4, 500, t0))
            .await
            .unwrap();
        f.ledger
            .create_layer(layer_input(&f.item, &f.main, 10, 800, t0 + Duration::days(1)))
            .await
            .unwrap();

        let created = f
            .ledger
            .create_transfer(&f.main, &f.store, vec![line(&f.item, 6)])
            .await
            .unwrap();
        assert_eq!(created.status, TransferStatus::Pending);

        let shipped = f.ledger.ship_transfer(&created.id).await.unwrap();
        assert_eq!(shipped.status, TransferStatus::InTransit);
        assert_eq!(shipped.lines[0].shipped_cost, Some(Money::from_cents(3600)));

        let source = f.ledger.balance(&f.item, &f.main, None).await.unwrap().unwrap();
        assert_eq!(source.on_hand, 8);
        assert_eq!(source.in_transit, 6);

        let received = f.ledger.receive_transfer(&created.id).await.unwrap();
        assert_eq!(received.status, TransferStatus::Received);
        assert!(received.received_at.is_some());

        let landed = f.ledger.layers(&f.item, &f.store).await.unwrap();
        assert_eq!(landed.len(), 2);
        assert!(landed.iter().all(|l| l.layer_type == LayerType::TransferIn));
        assert_eq!(landed[0].unit_cost, UnitCost::from_cents(500));
        assert_eq!(landed[0].quantity_received, 4);
        assert_eq!(landed[1].unit_cost, UnitCost::from_cents(800));
        assert_eq!(landed[1].quantity_received, 2);

        let source = f.ledger.balance(&f.item, &f.main, None).await.unwrap().unwrap();
        assert_eq!(source.in_transit, 0);
        let destination = f.ledger.balance(&f.item, &f.store, None).await.unwrap().unwrap();
        assert_eq!(destination.on_hand, 6);

        assert_eq!(
            f.ledger.total_inventory_value(Some(&f.item), Some(&f.store)).await.unwrap(),
            Money::from_cents(3600)
        );
        assert!(f.ledger.reconcile(&f.item, &f.main).await.unwrap().in_sync);
        assert!(f.ledger.reconcile(&f.item, &f.store).await.unwrap().in_sync);
    }

    #[tokio::test]
    async fn test_cancel_in_transit_restores_source_layers() {
        let f = fixture().await;
        let layer = f
            .ledger
            .create_layer(layer_input(&f.item, &f.main, 10, 500, Utc::now()))
            .await
            .unwrap();

        let created = f
            .ledger
            .create_transfer(&f.main, &f.store, vec![line(&f.item, 7)])
            .await
            .unwrap();
        f.ledger.ship_transfer(&created.id).await.unwrap();

        let cancelled = f.ledger.cancel_transfer(&created.id).await.unwrap();
        assert_eq!(cancelled.status, TransferStatus::Cancelled);

        let layer = f.ledger.layer(&layer.id).await.unwrap().unwrap();
        assert_eq!(layer.quantity_remaining, 10);
        let source = f.ledger.balance(&f.item, &f.main, None).await.unwrap().unwrap();
        assert_eq!(source.on_hand, 10);
        assert_eq!(source.in_transit, 0);
        assert!(f.ledger.layers(&f.item, &f.store).await.unwrap().is_empty());

        let records = f
            .ledger
            .consumptions_for(&TransactionRef::Transfer(created.id.clone()))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.iter().map(|c| c.net_quantity()).sum::<i64>(), 0);

        let err = f.ledger.receive_transfer(&created.id).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Conflict);
    }

    #[tokio::test]
    async fn test_state_machine_edges() {
        let f = fixture().await;
        f.ledger
            .create_layer(layer_input(&f.item, &f.main, 10, 500, Utc::now()))
            .await
            .unwrap();

        let pending = f
            .ledger
            .create_transfer(&f.main, &f.store, vec![line(&f.item, 1)])
            .await
            .unwrap();
        assert_eq!(f.ledger.receive_transfer(&pending.id).await.unwrap_err().class(), ErrorClass::Conflict);
        let cancelled = f.ledger.cancel_transfer(&pending.id).await.unwrap();
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(f.ledger.ship_transfer(&pending.id).await.unwrap_err().class(), ErrorClass::Conflict);

        let done = f
            .ledger
            .create_transfer(&f.main, &f.store, vec![line(&f.item, 1)])
            .await
            .unwrap();
        f.ledger.ship_transfer(&done.id).await.unwrap();
        f.ledger.receive_transfer(&done.id).await.unwrap();
        assert_eq!(f.ledger.cancel_transfer(&done.id).await.unwrap_err().class(), ErrorClass::Conflict);
    }

    #[tokio::test]
    async fn test_failed_ship_moves_nothing() {
        let f = fixture().await;
        let nut = f.db.catalog().register_item("NUT-M8", "M8 nut").await.unwrap().id;
        f.ledger
            .create_layer(layer_input(&f.item, &f.main, 10, 500, Utc::now()))
            .await
            .unwrap();

        let created = f
            .ledger
            .create_transfer(&f.main, &f.store, vec![line(&f.item, 5), line(&nut, 1)])
            .await
            .unwrap();
        let err = f.ledger.ship_transfer(&created.id).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::InsufficientInventory);

        let stored = f.ledger.transfer(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Pending);
        assert_eq!(stored.lines[0].shipped_cost, None);
        let source = f.ledger.balance(&f.item, &f.main, None).await.unwrap().unwrap();
        assert_eq!(source.on_hand, 10);
        assert_eq!(source.in_transit, 0);
    }

    #[tokio::test]
    async fn test_deactivation_blocks_ship_and_receive() {
        let f = fixture().await;
        f.ledger
            .create_layer(layer_input(&f.item, &f.main, 10, 500, Utc::now()))
            .await
            .unwrap();

        let created = f
            .ledger
            .create_transfer(&f.main, &f.store, vec![line(&f.item, 4)])
            .await
            .unwrap();
        f.db.catalog().deactivate_location(&f.main).await.unwrap();
        let err = f.ledger.ship_transfer(&created.id).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::Inactive { .. })));
        let stored = f.ledger.transfer(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Pending);

        let f = fixture().await;
        f.ledger
            .create_layer(layer_input(&f.item, &f.main, 10, 500, Utc::now()))
            .await
            .unwrap();
        let created = f
            .ledger
            .create_transfer(&f.main, &f.store, vec![line(&f.item, 4)])
            .await
            .unwrap();
        f.ledger.ship_transfer(&created.id).await.unwrap();
        f.db.catalog().deactivate_location(&f.store).await.unwrap();

        let err = f.ledger.receive_transfer(&created.id).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation);
        assert!(f.ledger.layers(&f.item, &f.store).await.unwrap().is_empty());

        let cancelled = f.ledger.cancel_transfer(&created.id).await.unwrap();
        assert_eq!(cancelled.status, TransferStatus::Cancelled);
        let source = f.ledger.balance(&f.item, &f.main, None).await.unwrap().unwrap();
        assert_eq!(source.on_hand, 10);
        assert_eq!(source.in_transit, 0);
    }

    #[tokio::test]
    async fn test_invalid_transfers_rejected() {
        let f = fixture().await;

        let err = f
            .ledger
            .create_transfer(&f.main, &f.main, vec![line(&f.item, 1)])
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation);

        let err = f
            .ledger
            .create_transfer(&f.main, &f.store, vec![line(&f.item, 1), line(&f.item, 2)])
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation);

        let err = f
            .ledger
            .create_transfer(&f.main, &f.store, vec![line(&f.item, 0)])
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation);
    }
}

//! # Consumption Repository
//!
//! FIFO draws against cost layers and the append-only consumption trail.
//!
//! ## Draw Flow
//! ```text
//! consume_fifo(item, location, qty, txn)
//!      │
//!      ├── cost_layer::consumable()      oldest first
//!      ├── fifo::plan_fifo()             pure; fails before any write
//!      │
//!      └── for each planned draw
//!            ├── cost_layer::draw()      remaining -= take
//!            └── INSERT layer_consumptions
//! ```
//!
//! ## Reversal Links
//! ```text
//! original  ──reversed_by──►  counter-record
//!           ◄──reversal_of──
//! ```
//! Each side is UNIQUE in the schema, so a record is reversed at most once.
//! Balances are never touched here.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, error};

use crate::error::{DbError, DbResult};
use crate::repository::{balance, cost_layer};
use strata_core::fifo::plan_fifo;
use strata_core::{
    ConsumptionId, ConsumptionResult, CoreError, CostLayer, CostLayerId, ItemId, LayerConsumption,
    LayerDraw, LocationId, Money, TransactionKind, TransactionRef, UnitCost,
};

#[derive(Debug, sqlx::FromRow)]
struct ConsumptionRow {
    id: ConsumptionId,
    cost_layer_id: CostLayerId,
    transaction_type: TransactionKind,
    transaction_id: String,
    quantity: i64,
    unit_cost: UnitCost,
    total_cost: Money,
    transaction_date: DateTime<Utc>,
    reversal_of: Option<ConsumptionId>,
    reversed_by: Option<ConsumptionId>,
}

impl From<ConsumptionRow> for LayerConsumption {
    fn from(row: ConsumptionRow) -> Self {
        LayerConsumption {
            id: row.id,
            cost_layer_id: row.cost_layer_id,
            transaction: TransactionRef::from_parts(row.transaction_type, row.transaction_id),
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            total_cost: row.total_cost,
            transaction_date: row.transaction_date,
            reversal_of: row.reversal_of,
            reversed_by: row.reversed_by,
        }
    }
}

const CONSUMPTION_COLUMNS: &str = r#"
    id, cost_layer_id, transaction_type, transaction_id,
    quantity, unit_cost, total_cost, transaction_date,
    reversal_of, reversed_by
"#;

/// Result of reversing one consumption record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionReversal {
    pub original: LayerConsumption,
    pub reversal: LayerConsumption,
    /// Layer state after the reversal.
    pub layer: CostLayer,
    /// `false` when the layer was voided or not available: the units were not
    /// put back and the caller must re-create them.
    pub restored: bool,
}

struct NewConsumption<'a> {
    cost_layer_id: &'a CostLayerId,
    transaction: &'a TransactionRef,
    quantity: i64,
    unit_cost: UnitCost,
    total_cost: Money,
    transaction_date: DateTime<Utc>,
    reversal_of: Option<&'a ConsumptionId>,
}

async fn insert(
    conn: &mut SqliteConnection,
    record: NewConsumption<'_>,
    now: DateTime<Utc>,
) -> DbResult<ConsumptionId> {
    let id = ConsumptionId::generate();

    sqlx::query(
        r#"
        INSERT INTO layer_consumptions (
            id, cost_layer_id, transaction_type, transaction_id,
            quantity, unit_cost, total_cost, transaction_date,
            reversal_of, reversed_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10)
        "#,
    )
    .bind(&id)
    .bind(record.cost_layer_id)
    .bind(record.transaction.kind())
    .bind(record.transaction.id_str())
    .bind(record.quantity)
    .bind(record.unit_cost)
    .bind(record.total_cost)
    .bind(record.transaction_date)
    .bind(record.reversal_of)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

pub async fn get(
    conn: &mut SqliteConnection,
    id: &ConsumptionId,
) -> DbResult<Option<LayerConsumption>> {
    let sql = format!(
        "SELECT {} FROM layer_consumptions WHERE id = ?1",
        CONSUMPTION_COLUMNS
    );
    let row = sqlx::query_as::<_, ConsumptionRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(LayerConsumption::from))
}

pub async fn require(
    conn: &mut SqliteConnection,
    id: &ConsumptionId,
) -> DbResult<LayerConsumption> {
    get(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("LayerConsumption", id).into())
}

/// Every record written under `transaction`, reversals included, in write order.
pub async fn for_transaction(
    conn: &mut SqliteConnection,
    transaction: &TransactionRef,
) -> DbResult<Vec<LayerConsumption>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM layer_consumptions
        WHERE transaction_type = ?1 AND transaction_id = ?2
        ORDER BY rowid
        "#,
        CONSUMPTION_COLUMNS
    );
    let rows = sqlx::query_as::<_, ConsumptionRow>(&sql)
        .bind(transaction.kind())
        .bind(transaction.id_str())
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(LayerConsumption::from).collect())
}

/// Unreversed original draws of `item_id` made under `transaction`.
pub async fn open_draws(
    conn: &mut SqliteConnection,
    transaction: &TransactionRef,
    item_id: &ItemId,
) -> DbResult<Vec<LayerConsumption>> {
    let rows = sqlx::query_as::<_, ConsumptionRow>(
        r#"
        SELECT c.id, c.cost_layer_id, c.transaction_type, c.transaction_id,
               c.quantity, c.unit_cost, c.total_cost, c.transaction_date,
               c.reversal_of, c.reversed_by
        FROM layer_consumptions c
        JOIN cost_layers l ON l.id = c.cost_layer_id
        WHERE c.transaction_type = ?1
          AND c.transaction_id = ?2
          AND l.item_id = ?3
          AND c.reversal_of IS NULL
          AND c.reversed_by IS NULL
        ORDER BY c.rowid
        "#,
    )
    .bind(transaction.kind())
    .bind(transaction.id_str())
    .bind(item_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(LayerConsumption::from).collect())
}

pub async fn for_layer(
    conn: &mut SqliteConnection,
    cost_layer_id: &CostLayerId,
) -> DbResult<Vec<LayerConsumption>> {
    let sql = format!(
        "SELECT {} FROM layer_consumptions WHERE cost_layer_id = ?1 ORDER BY rowid",
        CONSUMPTION_COLUMNS
    );
    let rows = sqlx::query_as::<_, ConsumptionRow>(&sql)
        .bind(cost_layer_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(LayerConsumption::from).collect())
}

/// Draws `quantity` from the pair's layers in FIFO order.
///
/// ## Errors
/// - `InsufficientInventory` when the consumable layers hold less than
///   `quantity`. Nothing has been written at that point.
pub async fn consume_fifo(
    conn: &mut SqliteConnection,
    item_id: &ItemId,
    location_id: &LocationId,
    quantity: i64,
    transaction: &TransactionRef,
    transaction_date: DateTime<Utc>,
) -> DbResult<ConsumptionResult> {
    let candidates = cost_layer::consumable(conn, item_id, location_id).await?;

    let plan = match plan_fifo(item_id, location_id, &candidates, quantity) {
        Ok(plan) => plan,
        Err(err @ CoreError::InsufficientInventory { .. }) => {
            let on_hand = balance::on_hand_total(conn, item_id, location_id).await?;
            error!(
                item_id = %item_id,
                location_id = %location_id,
                transaction = %transaction,
                requested = quantity,
                balance_on_hand = on_hand,
                error = %err,
                "FIFO layers cannot cover requested quantity"
            );
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    let now = Utc::now();
    let mut layers_consumed = Vec::with_capacity(plan.draws.len());

    for draw in &plan.draws {
        cost_layer::draw(conn, &draw.cost_layer_id, draw.quantity).await?;
        let consumption_id = insert(
            conn,
            NewConsumption {
                cost_layer_id: &draw.cost_layer_id,
                transaction,
                quantity: draw.quantity,
                unit_cost: draw.unit_cost,
                total_cost: draw.total_cost,
                transaction_date,
                reversal_of: None,
            },
            now,
        )
        .await?;

        debug!(
            consumption_id = %consumption_id,
            cost_layer_id = %draw.cost_layer_id,
            quantity = draw.quantity,
            unit_cost = %draw.unit_cost,
            "Layer drawn"
        );

        layers_consumed.push(LayerDraw {
            consumption_id,
            cost_layer_id: draw.cost_layer_id.clone(),
            quantity: draw.quantity,
            unit_cost: draw.unit_cost,
            total_cost: draw.total_cost,
        });
    }

    Ok(ConsumptionResult {
        total_cost: plan.total_cost,
        layers_consumed,
    })
}

/// Writes the counter-record for `consumption_id` and links both records.
///
/// Units go back into the layer when it is still consumable-eligible (not
/// voided, quality `available`). Otherwise the layer is left alone and
/// [`ConsumptionReversal::restored`] is `false`.
pub async fn reverse(
    conn: &mut SqliteConnection,
    consumption_id: &ConsumptionId,
    reversing: &TransactionRef,
    transaction_date: DateTime<Utc>,
) -> DbResult<ConsumptionReversal> {
    let original = require(conn, consumption_id).await?;

    if original.is_reversal() {
        return Err(CoreError::invalid_transition(
            "LayerConsumption",
            &original.id,
            "a reversal",
            "reverse",
        )
        .into());
    }
    if original.is_reversed() {
        return Err(CoreError::invalid_transition(
            "LayerConsumption",
            &original.id,
            "already reversed",
            "reverse",
        )
        .into());
    }

    let layer = cost_layer::require(conn, &original.cost_layer_id).await?;
    let restored = !layer.voided && layer.quality_status.is_consumable();
    if restored {
        cost_layer::restore(conn, &layer.id, original.quantity).await?;
    }

    let reversal_id = insert(
        conn,
        NewConsumption {
            cost_layer_id: &original.cost_layer_id,
            transaction: reversing,
            quantity: original.quantity,
            unit_cost: original.unit_cost,
            total_cost: original.total_cost,
            transaction_date,
            reversal_of: Some(&original.id),
        },
        Utc::now(),
    )
    .await?;

    let linked = sqlx::query(
        "UPDATE layer_consumptions SET reversed_by = ?2 WHERE id = ?1 AND reversed_by IS NULL",
    )
    .bind(&original.id)
    .bind(&reversal_id)
    .execute(&mut *conn)
    .await?;

    if linked.rows_affected() == 0 {
        return Err(DbError::not_found("LayerConsumption (unreversed)", &original.id));
    }

    debug!(
        consumption_id = %original.id,
        reversal_id = %reversal_id,
        cost_layer_id = %layer.id,
        quantity = original.quantity,
        restored,
        "Consumption reversed"
    );

    let original = require(conn, &original.id).await?;
    let reversal = require(conn, &reversal_id).await?;
    let layer = cost_layer::require(conn, &layer.id).await?;

    Ok(ConsumptionReversal {
        original,
        reversal,
        layer,
        restored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use strata_core::{
        AdjustmentId, FulfillmentId, LayerType, NewCostLayer, QualityStatus,
    };

    async fn setup() -> (Database, ItemId, LocationId) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let item = db.catalog().register_item("SKU-1", "Item").await.unwrap();
        let loc = db.catalog().register_location("MAIN", "Main").await.unwrap();
        (db, item.id, loc.id)
    }

    async fn layer(
        conn: &mut SqliteConnection,
        item: &ItemId,
        loc: &LocationId,
        qty: i64,
        cents: i64,
        date: DateTime<Utc>,
    ) -> CostLayer {
        let new = NewCostLayer {
            item_id: item.clone(),
            location_id: loc.clone(),
            quantity: qty,
            unit_cost: UnitCost::from_cents(cents),
            receipt_date: date,
            layer_type: LayerType::Receipt,
            source_reference: None,
            quality_status: QualityStatus::Available,
        };
        cost_layer::insert(conn, &new, date).await.unwrap()
    }

    #[tokio::test]
    async fn test_consume_spans_layers_oldest_first() {
        let (db, item, loc) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let t0 = Utc::now();
        let first = layer(&mut conn, &item, &loc, 10, 500, t0).await;
        let second = layer(&mut conn, &item, &loc, 10, 700, t0 + Duration::days(1)).await;

        let txn = TransactionRef::Fulfillment(FulfillmentId::from("so-1"));
        let result = consume_fifo(&mut conn, &item, &loc, 15, &txn, t0).await.unwrap();

        assert_eq!(result.total_cost, Money::from_cents(8500));
        assert_eq!(result.layers_consumed.len(), 2);
        assert_eq!(result.layers_consumed[0].cost_layer_id, first.id);
        assert_eq!(result.layers_consumed[1].quantity, 5);

        let second = cost_layer::require(&mut conn, &second.id).await.unwrap();
        assert_eq!(second.quantity_remaining, 5);

        let records = for_transaction(&mut conn, &txn).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].transaction, txn);
        assert_eq!(records[1].total_cost, Money::from_cents(3500));
    }

    #[tokio::test]
    async fn test_insufficient_inventory_writes_nothing() {
        let (db, item, loc) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();
        let only = layer(&mut conn, &item, &loc, 4, 100, now).await;

        let txn = TransactionRef::Fulfillment(FulfillmentId::from("so-2"));
        let err = consume_fifo(&mut conn, &item, &loc, 5, &txn, now).await.unwrap_err();

        assert_eq!(err.class(), ErrorClass::InsufficientInventory);
        match err.as_domain() {
            Some(CoreError::InsufficientInventory {
                requested,
                available,
                ..
            }) => {
                assert_eq!(*requested, 5);
                assert_eq!(*available, 4);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let only = cost_layer::require(&mut conn, &only.id).await.unwrap();
        assert_eq!(only.quantity_remaining, 4);
        assert!(for_layer(&mut conn, &only.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reverse_restores_and_links_once() {
        let (db, item, loc) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();
        let source = layer(&mut conn, &item, &loc, 10, 300, now).await;

        let txn = TransactionRef::Adjustment(AdjustmentId::from("adj-1"));
        let result = consume_fifo(&mut conn, &item, &loc, 6, &txn, now).await.unwrap();
        let drawn = &result.layers_consumed[0].consumption_id;

        let undo = TransactionRef::Adjustment(AdjustmentId::from("adj-2"));
        let reversal = reverse(&mut conn, drawn, &undo, now).await.unwrap();

        assert!(reversal.restored);
        assert_eq!(reversal.layer.quantity_remaining, 10);
        assert_eq!(reversal.original.reversed_by, Some(reversal.reversal.id.clone()));
        assert_eq!(reversal.reversal.reversal_of, Some(drawn.clone()));
        assert_eq!(reversal.reversal.net_quantity(), -6);

        let again = reverse(&mut conn, drawn, &undo, now).await.unwrap_err();
        assert_eq!(again.class(), ErrorClass::Conflict);
        let of_reversal = reverse(&mut conn, &reversal.reversal.id, &undo, now)
            .await
            .unwrap_err();
        assert_eq!(of_reversal.class(), ErrorClass::Conflict);

        let history = for_layer(&mut conn, &source.id).await.unwrap();
        let net: i64 = history.iter().map(|c| c.net_quantity()).sum();
        assert_eq!(net, 0);
    }

    #[tokio::test]
    async fn test_reverse_onto_voided_layer_is_detached() {
        let (db, item, loc) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();
        let source = layer(&mut conn, &item, &loc, 10, 300, now).await;

        let txn = TransactionRef::Adjustment(AdjustmentId::from("adj-1"));
        let result = consume_fifo(&mut conn, &item, &loc, 4, &txn, now).await.unwrap();
        cost_layer::void(&mut conn, &source.id, "recall", now).await.unwrap();

        let undo = TransactionRef::Adjustment(AdjustmentId::from("adj-2"));
        let reversal = reverse(&mut conn, &result.layers_consumed[0].consumption_id, &undo, now)
            .await
            .unwrap();

        assert!(!reversal.restored);
        assert_eq!(reversal.layer.quantity_remaining, 6);
        assert!(reversal.original.is_reversed());
    }

    #[tokio::test]
    async fn test_consumption_trail_is_append_only() {
        let (db, item, loc) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();
        layer(&mut conn, &item, &loc, 3, 100, now).await;

        let txn = TransactionRef::Fulfillment(FulfillmentId::from("so-3"));
        let result = consume_fifo(&mut conn, &item, &loc, 1, &txn, now).await.unwrap();
        let id = &result.layers_consumed[0].consumption_id;

        let err = sqlx::query("UPDATE layer_consumptions SET quantity = 2 WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation { .. }));

        let err = sqlx::query("DELETE FROM layer_consumptions WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation { .. }));
    }
}

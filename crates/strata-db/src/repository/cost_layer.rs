//! # Cost Layer Repository
//!
//! Row-level operations on `cost_layers`. Nothing here touches balances;
//! the ledger pairs every call with the matching balance delta.
//!
//! ## Column Mutability
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  function               columns written                                 │
//! │  ─────────────────────  ──────────────────────────────────────────────  │
//! │  insert                 all (remaining = received)                      │
//! │  draw / restore         quantity_remaining                              │
//! │  raise_unit_cost        unit_cost, landed_cost_per_unit                 │
//! │  set_unit_cost          unit_cost                                       │
//! │  set_quality            quality_status                                  │
//! │  void                   voided, void_reason, voided_at                  │
//! │                                                                         │
//! │  Everything else is guarded by trg_cost_layers_immutable.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use strata_core::validation::{validate_quantity, validate_unit_cost};
use strata_core::{
    CoreError, CostLayer, CostLayerId, ItemId, LocationId, NewCostLayer, QualityStatus, UnitCost,
};

const LAYER_COLUMNS: &str = r#"
    rowid AS sequence,
    id,
    item_id,
    location_id,
    source_reference,
    layer_type,
    quantity_received,
    quantity_remaining,
    unit_cost,
    original_unit_cost,
    landed_cost_per_unit,
    receipt_date,
    quality_status,
    voided,
    void_reason,
    voided_at,
    created_at
"#;

/// Inserts a new layer with `remaining = received`.
pub async fn insert(
    conn: &mut SqliteConnection,
    layer: &NewCostLayer,
    now: DateTime<Utc>,
) -> DbResult<CostLayer> {
    validate_quantity(layer.quantity)?;
    validate_unit_cost(layer.unit_cost)?;

    let id = CostLayerId::generate();

    debug!(
        id = %id,
        item_id = %layer.item_id,
        location_id = %layer.location_id,
        quantity = layer.quantity,
        unit_cost = %layer.unit_cost,
        layer_type = ?layer.layer_type,
        "Creating cost layer"
    );

    sqlx::query(
        r#"
        INSERT INTO cost_layers (
            id, item_id, location_id, source_reference, layer_type,
            quantity_received, quantity_remaining,
            unit_cost, original_unit_cost, landed_cost_per_unit,
            receipt_date, quality_status, voided, created_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?6,
            ?7, ?7, 0,
            ?8, ?9, 0, ?10
        )
        "#,
    )
    .bind(&id)
    .bind(&layer.item_id)
    .bind(&layer.location_id)
    .bind(&layer.source_reference)
    .bind(layer.layer_type)
    .bind(layer.quantity)
    .bind(layer.unit_cost)
    .bind(layer.receipt_date)
    .bind(layer.quality_status)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    require(conn, &id).await
}

pub async fn get(conn: &mut SqliteConnection, id: &CostLayerId) -> DbResult<Option<CostLayer>> {
    let sql = format!("SELECT {} FROM cost_layers WHERE id = ?1", LAYER_COLUMNS);
    let layer = sqlx::query_as::<_, CostLayer>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(layer)
}

pub async fn require(conn: &mut SqliteConnection, id: &CostLayerId) -> DbResult<CostLayer> {
    get(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("CostLayer", id).into())
}

/// Layers a FIFO draw may select, oldest first.
pub async fn consumable(
    conn: &mut SqliteConnection,
    item_id: &ItemId,
    location_id: &LocationId,
) -> DbResult<Vec<CostLayer>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM cost_layers
        WHERE item_id = ?1
          AND location_id = ?2
          AND voided = 0
          AND quality_status = 'available'
          AND quantity_remaining > 0
        ORDER BY receipt_date, rowid
        "#,
        LAYER_COLUMNS
    );
    let layers = sqlx::query_as::<_, CostLayer>(&sql)
        .bind(item_id)
        .bind(location_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(layers)
}

/// Every layer of the pair, voided and exhausted included.
pub async fn list(
    conn: &mut SqliteConnection,
    item_id: &ItemId,
    location_id: &LocationId,
) -> DbResult<Vec<CostLayer>> {
    let sql = format!(
        "SELECT {} FROM cost_layers WHERE item_id = ?1 AND location_id = ?2 ORDER BY receipt_date, rowid",
        LAYER_COLUMNS
    );
    let layers = sqlx::query_as::<_, CostLayer>(&sql)
        .bind(item_id)
        .bind(location_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(layers)
}

/// Non-voided layers with stock, optionally narrowed to an item and/or location.
pub async fn valued(
    conn: &mut SqliteConnection,
    item_id: Option<&ItemId>,
    location_id: Option<&LocationId>,
) -> DbResult<Vec<CostLayer>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM cost_layers
        WHERE voided = 0
          AND quantity_remaining > 0
          AND (?1 IS NULL OR item_id = ?1)
          AND (?2 IS NULL OR location_id = ?2)
        "#,
        LAYER_COLUMNS
    );
    let layers = sqlx::query_as::<_, CostLayer>(&sql)
        .bind(item_id)
        .bind(location_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(layers)
}

/// Decrements remaining. Fails if the layer no longer holds `quantity`.
pub async fn draw(conn: &mut SqliteConnection, id: &CostLayerId, quantity: i64) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE cost_layers
        SET quantity_remaining = quantity_remaining - ?2
        WHERE id = ?1
          AND voided = 0
          AND quantity_remaining >= ?2
        "#,
    )
    .bind(id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::invariant(format!(
            "layer {} cannot supply {} units",
            id, quantity
        ))
        .into());
    }

    Ok(())
}

/// Puts `quantity` back into a layer (consumption reversal).
pub async fn restore(conn: &mut SqliteConnection, id: &CostLayerId, quantity: i64) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE cost_layers
        SET quantity_remaining = quantity_remaining + ?2
        WHERE id = ?1
          AND voided = 0
          AND quantity_remaining + ?2 <= quantity_received
        "#,
    )
    .bind(id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::invariant(format!(
            "layer {} cannot take back {} units",
            id, quantity
        ))
        .into());
    }

    Ok(())
}

/// Adds a landed cost increase to the unit cost.
pub async fn raise_unit_cost(
    conn: &mut SqliteConnection,
    id: &CostLayerId,
    increase: UnitCost,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE cost_layers
        SET unit_cost = unit_cost + ?2,
            landed_cost_per_unit = landed_cost_per_unit + ?2
        WHERE id = ?1 AND voided = 0
        "#,
    )
    .bind(id)
    .bind(increase)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("CostLayer (not voided)", id));
    }

    Ok(())
}

/// Replaces the unit cost (explicit revaluation).
pub async fn set_unit_cost(
    conn: &mut SqliteConnection,
    id: &CostLayerId,
    unit_cost: UnitCost,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE cost_layers SET unit_cost = ?2 WHERE id = ?1 AND voided = 0")
        .bind(id)
        .bind(unit_cost)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("CostLayer (not voided)", id));
    }

    Ok(())
}

pub async fn set_quality(
    conn: &mut SqliteConnection,
    id: &CostLayerId,
    status: QualityStatus,
) -> DbResult<()> {
    let result =
        sqlx::query("UPDATE cost_layers SET quality_status = ?2 WHERE id = ?1 AND voided = 0")
            .bind(id)
            .bind(status)
            .execute(&mut *conn)
            .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("CostLayer (not voided)", id));
    }

    Ok(())
}

pub async fn void(
    conn: &mut SqliteConnection,
    id: &CostLayerId,
    reason: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE cost_layers
        SET voided = 1, void_reason = ?2, voided_at = ?3
        WHERE id = ?1 AND voided = 0
        "#,
    )
    .bind(id)
    .bind(reason)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("CostLayer (not voided)", id));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use strata_core::LayerType;

    async fn setup() -> (Database, ItemId, LocationId) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let item = db.catalog().register_item("SKU-1", "Item").await.unwrap();
        let loc = db.catalog().register_location("MAIN", "Main").await.unwrap();
        (db, item.id, loc.id)
    }

    fn new_layer(item: &ItemId, loc: &LocationId, qty: i64, cents: i64, date: DateTime<Utc>) -> NewCostLayer {
        NewCostLayer {
            item_id: item.clone(),
            location_id: loc.clone(),
            quantity: qty,
            unit_cost: UnitCost::from_cents(cents),
            receipt_date: date,
            layer_type: LayerType::Receipt,
            source_reference: None,
            quality_status: QualityStatus::Available,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch_in_fifo_order() {
        let (db, item, loc) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let t0 = Utc::now();

        let late = insert(&mut conn, &new_layer(&item, &loc, 5, 700, t0 + Duration::days(2)), t0)
            .await
            .unwrap();
        let early = insert(&mut conn, &new_layer(&item, &loc, 5, 500, t0), t0)
            .await
            .unwrap();

        assert_eq!(early.quantity_remaining, 5);
        assert_eq!(early.original_unit_cost, UnitCost::from_cents(500));
        assert!(late.sequence < early.sequence);

        let layers = consumable(&mut conn, &item, &loc).await.unwrap();
        let ids: Vec<_> = layers.iter().map(|l| l.id.clone()).collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }

    #[tokio::test]
    async fn test_draw_cannot_exceed_remaining() {
        let (db, item, loc) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();
        let layer = insert(&mut conn, &new_layer(&item, &loc, 5, 100, now), now).await.unwrap();

        draw(&mut conn, &layer.id, 3).await.unwrap();
        assert!(draw(&mut conn, &layer.id, 3).await.is_err());
        restore(&mut conn, &layer.id, 3).await.unwrap();
        assert!(restore(&mut conn, &layer.id, 1).await.is_err());

        assert_eq!(require(&mut conn, &layer.id).await.unwrap().quantity_remaining, 5);
    }

    #[tokio::test]
    async fn test_voided_layer_is_frozen() {
        let (db, item, loc) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();
        let layer = insert(&mut conn, &new_layer(&item, &loc, 5, 100, now), now).await.unwrap();

        void(&mut conn, &layer.id, "water damage", now).await.unwrap();
        assert!(void(&mut conn, &layer.id, "again", now).await.is_err());
        assert!(set_unit_cost(&mut conn, &layer.id, UnitCost::from_cents(1)).await.is_err());
        assert!(draw(&mut conn, &layer.id, 1).await.is_err());

        assert!(consumable(&mut conn, &item, &loc).await.unwrap().is_empty());
        assert!(valued(&mut conn, Some(&item), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_receipt_date_is_immutable() {
        let (db, item, loc) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();
        let layer = insert(&mut conn, &new_layer(&item, &loc, 5, 100, now), now).await.unwrap();

        let err = sqlx::query("UPDATE cost_layers SET receipt_date = ?2 WHERE id = ?1")
            .bind(&layer.id)
            .bind(now + Duration::days(1))
            .execute(&mut *conn)
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation { .. }));

        let err = sqlx::query("DELETE FROM cost_layers WHERE id = ?1")
            .bind(&layer.id)
            .execute(&mut *conn)
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation { .. }));
    }
}

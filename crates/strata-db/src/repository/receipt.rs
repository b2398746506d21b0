//! Received purchases. Lines reference the layer their accepted quantity
//! created; lines that accepted nothing carry no layer.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use strata_core::{
    CoreError, CostLayerId, ItemId, ItemReceipt, ItemReceiptLine, LocationId, QualityStatus,
    ReceiptId, ReceiptLineId, UnitCost,
};

#[derive(Debug, sqlx::FromRow)]
struct ReceiptRow {
    id: ReceiptId,
    location_id: LocationId,
    reference: Option<String>,
    received_at: DateTime<Utc>,
}

/// A line ready to be stored, after its layer (if any) was created.
#[derive(Debug, Clone)]
pub struct StoredLine {
    pub id: ReceiptLineId,
    pub item_id: ItemId,
    pub quantity_accepted: i64,
    pub unit_cost: UnitCost,
    pub weight_grams: Option<i64>,
    pub quality_status: QualityStatus,
    pub cost_layer_id: Option<CostLayerId>,
}

pub async fn insert(
    conn: &mut SqliteConnection,
    id: &ReceiptId,
    location_id: &LocationId,
    reference: Option<&str>,
    received_at: DateTime<Utc>,
    lines: &[StoredLine],
    now: DateTime<Utc>,
) -> DbResult<ItemReceipt> {
    sqlx::query(
        r#"
        INSERT INTO item_receipts (id, location_id, reference, received_at, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(id)
    .bind(location_id)
    .bind(reference)
    .bind(received_at)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    for (index, line) in lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO item_receipt_lines (
                id, receipt_id, line_number, item_id, quantity_accepted,
                unit_cost, weight_grams, quality_status, cost_layer_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&line.id)
        .bind(id)
        .bind(index as i64 + 1)
        .bind(&line.item_id)
        .bind(line.quantity_accepted)
        .bind(line.unit_cost)
        .bind(line.weight_grams)
        .bind(line.quality_status)
        .bind(&line.cost_layer_id)
        .execute(&mut *conn)
        .await?;
    }

    debug!(receipt_id = %id, lines = lines.len(), "Receipt stored");

    require(conn, id).await
}

pub async fn get(conn: &mut SqliteConnection, id: &ReceiptId) -> DbResult<Option<ItemReceipt>> {
    let row = sqlx::query_as::<_, ReceiptRow>(
        "SELECT id, location_id, reference, received_at FROM item_receipts WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let lines = sqlx::query_as::<_, ItemReceiptLine>(
        r#"
        SELECT id, receipt_id, item_id, quantity_accepted, unit_cost,
               weight_grams, quality_status, cost_layer_id
        FROM item_receipt_lines
        WHERE receipt_id = ?1
        ORDER BY line_number
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(ItemReceipt {
        id: row.id,
        location_id: row.location_id,
        reference: row.reference,
        received_at: row.received_at,
        lines,
    }))
}

pub async fn require(conn: &mut SqliteConnection, id: &ReceiptId) -> DbResult<ItemReceipt> {
    get(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("ItemReceipt", id).into())
}

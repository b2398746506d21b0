//! Inter-location transfer documents and their lines.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use strata_core::{
    CoreError, LocationId, Money, NewTransferLine, Transfer, TransferId, TransferLine,
    TransferLineId, TransferStatus,
};

#[derive(Debug, sqlx::FromRow)]
struct TransferRow {
    id: TransferId,
    source_location_id: LocationId,
    destination_location_id: LocationId,
    status: TransferStatus,
    created_at: DateTime<Utc>,
    shipped_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

pub async fn insert(
    conn: &mut SqliteConnection,
    source_location_id: &LocationId,
    destination_location_id: &LocationId,
    lines: &[NewTransferLine],
    now: DateTime<Utc>,
) -> DbResult<Transfer> {
    let id = TransferId::generate();

    sqlx::query(
        r#"
        INSERT INTO transfers (id, source_location_id, destination_location_id, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&id)
    .bind(source_location_id)
    .bind(destination_location_id)
    .bind(TransferStatus::Pending)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    for (index, line) in lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO transfer_lines (id, transfer_id, line_number, item_id, quantity)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(TransferLineId::generate())
        .bind(&id)
        .bind(index as i64 + 1)
        .bind(&line.item_id)
        .bind(line.quantity)
        .execute(&mut *conn)
        .await?;
    }

    debug!(transfer_id = %id, lines = lines.len(), "Transfer stored");

    require(conn, &id).await
}

pub async fn get(conn: &mut SqliteConnection, id: &TransferId) -> DbResult<Option<Transfer>> {
    let row = sqlx::query_as::<_, TransferRow>(
        r#"
        SELECT id, source_location_id, destination_location_id, status,
               created_at, shipped_at, received_at, cancelled_at
        FROM transfers
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let lines = sqlx::query_as::<_, TransferLine>(
        r#"
        SELECT id, transfer_id, line_number, item_id, quantity, shipped_cost
        FROM transfer_lines
        WHERE transfer_id = ?1
        ORDER BY line_number
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(Transfer {
        id: row.id,
        source_location_id: row.source_location_id,
        destination_location_id: row.destination_location_id,
        status: row.status,
        created_at: row.created_at,
        shipped_at: row.shipped_at,
        received_at: row.received_at,
        cancelled_at: row.cancelled_at,
        lines,
    }))
}

pub async fn require(conn: &mut SqliteConnection, id: &TransferId) -> DbResult<Transfer> {
    get(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Transfer", id).into())
}

/// Moves `id` from `from` to `to` and stamps the timestamp column of `to`.
pub async fn set_status(
    conn: &mut SqliteConnection,
    id: &TransferId,
    from: TransferStatus,
    to: TransferStatus,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let stamp_column = match to {
        TransferStatus::InTransit => "shipped_at",
        TransferStatus::Received => "received_at",
        TransferStatus::Cancelled => "cancelled_at",
        TransferStatus::Pending => {
            return Err(CoreError::invalid_transition("Transfer", id, from, "reopen").into())
        }
    };

    let sql = format!(
        "UPDATE transfers SET status = ?3, {} = ?4 WHERE id = ?1 AND status = ?2",
        stamp_column
    );
    let result = sqlx::query(&sql)
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(format!("Transfer ({})", from), id));
    }

    Ok(())
}

pub async fn set_shipped_cost(
    conn: &mut SqliteConnection,
    line_id: &TransferLineId,
    shipped_cost: Money,
) -> DbResult<()> {
    sqlx::query("UPDATE transfer_lines SET shipped_cost = ?2 WHERE id = ?1")
        .bind(line_id)
        .bind(shipped_cost)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

//! Quantity adjustment documents and their lines.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use strata_core::{
    Adjustment, AdjustmentId, AdjustmentLine, AdjustmentLineId, AdjustmentStatus, CoreError,
    LocationId, Money, NewAdjustmentLine,
};

#[derive(Debug, sqlx::FromRow)]
struct AdjustmentRow {
    id: AdjustmentId,
    location_id: LocationId,
    reason: String,
    status: AdjustmentStatus,
    reversal_of: Option<AdjustmentId>,
    created_at: DateTime<Utc>,
    posted_at: Option<DateTime<Utc>>,
}

/// Inserts a draft with its lines numbered from 1.
pub async fn insert(
    conn: &mut SqliteConnection,
    location_id: &LocationId,
    reason: &str,
    reversal_of: Option<&AdjustmentId>,
    lines: &[NewAdjustmentLine],
    now: DateTime<Utc>,
) -> DbResult<Adjustment> {
    let id = AdjustmentId::generate();

    sqlx::query(
        r#"
        INSERT INTO adjustments (id, location_id, reason, status, reversal_of, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&id)
    .bind(location_id)
    .bind(reason)
    .bind(AdjustmentStatus::Draft)
    .bind(reversal_of)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    for (index, line) in lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO adjustment_lines (
                id, adjustment_id, line_number, item_id, quantity_change, unit_cost
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(AdjustmentLineId::generate())
        .bind(&id)
        .bind(index as i64 + 1)
        .bind(&line.item_id)
        .bind(line.quantity_change)
        .bind(line.unit_cost)
        .execute(&mut *conn)
        .await?;
    }

    debug!(adjustment_id = %id, lines = lines.len(), "Adjustment stored");

    require(conn, &id).await
}

pub async fn get(conn: &mut SqliteConnection, id: &AdjustmentId) -> DbResult<Option<Adjustment>> {
    let row = sqlx::query_as::<_, AdjustmentRow>(
        r#"
        SELECT id, location_id, reason, status, reversal_of, created_at, posted_at
        FROM adjustments
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

    let lines = sqlx::query_as::<_, AdjustmentLine>(
        r#"
        SELECT id, adjustment_id, line_number, item_id, quantity_change, unit_cost, total_cost
        FROM adjustment_lines
        WHERE adjustment_id = ?1
        ORDER BY line_number
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(Adjustment {
        id: row.id,
        location_id: row.location_id,
        reason: row.reason,
        status: row.status,
        reversal_of: row.reversal_of,
        created_at: row.created_at,
        posted_at: row.posted_at,
        lines,
    }))
}

pub async fn require(conn: &mut SqliteConnection, id: &AdjustmentId) -> DbResult<Adjustment> {
    get(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Adjustment", id).into())
}

/// Moves `id` from `from` to `to`. Fails if the stored status is not `from`.
pub async fn set_status(
    conn: &mut SqliteConnection,
    id: &AdjustmentId,
    from: AdjustmentStatus,
    to: AdjustmentStatus,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let posted_at = if to == AdjustmentStatus::Posted {
        Some(now)
    } else {
        None
    };

    let result = sqlx::query(
        r#"
        UPDATE adjustments
        SET status = ?3, posted_at = COALESCE(?4, posted_at)
        WHERE id = ?1 AND status = ?2
        "#,
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(posted_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(format!("Adjustment ({})", from), id));
    }

    Ok(())
}

pub async fn set_line_total(
    conn: &mut SqliteConnection,
    line_id: &AdjustmentLineId,
    total_cost: Money,
) -> DbResult<()> {
    sqlx::query("UPDATE adjustment_lines SET total_cost = ?2 WHERE id = ?1")
        .bind(line_id)
        .bind(total_cost)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// The adjustment created by reversing `id`, if one exists.
pub async fn reversal_of(
    conn: &mut SqliteConnection,
    id: &AdjustmentId,
) -> DbResult<Option<AdjustmentId>> {
    let reversal = sqlx::query_scalar::<_, AdjustmentId>(
        "SELECT id FROM adjustments WHERE reversal_of = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(reversal)
}

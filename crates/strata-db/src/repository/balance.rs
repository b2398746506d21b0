//! # Balance Repository
//!
//! Persistence for `inventory_balances`. Delta math lives in
//! `strata_core::balance`; this module loads the row, applies it, writes it.
//!
//! ## Row Key
//! ```text
//! (item_id, location_id, bin_key)
//!                         └── '' for the location-level row (bin = None)
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::cost_layer;
use strata_core::balance::{apply_delta as apply_core_delta, average_cost};
use strata_core::{BinId, InventoryBalance, ItemId, LocationId, QuantityClass, UnitCost};

#[derive(Debug, sqlx::FromRow)]
struct BalanceRow {
    item_id: ItemId,
    location_id: LocationId,
    bin_key: String,
    on_hand: i64,
    available: i64,
    committed: i64,
    on_order: i64,
    in_transit: i64,
    reserved: i64,
    backordered: i64,
    average_cost: UnitCost,
    last_movement_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<BalanceRow> for InventoryBalance {
    fn from(row: BalanceRow) -> Self {
        InventoryBalance {
            item_id: row.item_id,
            location_id: row.location_id,
            bin_id: if row.bin_key.is_empty() {
                None
            } else {
                Some(BinId::from(row.bin_key))
            },
            on_hand: row.on_hand,
            available: row.available,
            committed: row.committed,
            on_order: row.on_order,
            in_transit: row.in_transit,
            reserved: row.reserved,
            backordered: row.backordered,
            average_cost: row.average_cost,
            last_movement_at: row.last_movement_at,
            updated_at: row.updated_at,
        }
    }
}

fn bin_key(bin_id: Option<&BinId>) -> &str {
    bin_id.map(|b| b.as_str()).unwrap_or("")
}

const BALANCE_COLUMNS: &str = r#"
    item_id, location_id, bin_key,
    on_hand, available, committed, on_order, in_transit, reserved, backordered,
    average_cost, last_movement_at, updated_at
"#;

pub async fn get(
    conn: &mut SqliteConnection,
    item_id: &ItemId,
    location_id: &LocationId,
    bin_id: Option<&BinId>,
) -> DbResult<Option<InventoryBalance>> {
    let sql = format!(
        "SELECT {} FROM inventory_balances WHERE item_id = ?1 AND location_id = ?2 AND bin_key = ?3",
        BALANCE_COLUMNS
    );
    let row = sqlx::query_as::<_, BalanceRow>(&sql)
        .bind(item_id)
        .bind(location_id)
        .bind(bin_key(bin_id))
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(InventoryBalance::from))
}

/// All rows of the pair, location-level row first.
pub async fn list_for_pair(
    conn: &mut SqliteConnection,
    item_id: &ItemId,
    location_id: &LocationId,
) -> DbResult<Vec<InventoryBalance>> {
    let sql = format!(
        "SELECT {} FROM inventory_balances WHERE item_id = ?1 AND location_id = ?2 ORDER BY bin_key",
        BALANCE_COLUMNS
    );
    let rows = sqlx::query_as::<_, BalanceRow>(&sql)
        .bind(item_id)
        .bind(location_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(InventoryBalance::from).collect())
}

/// Σ on_hand across every bin of the pair.
pub async fn on_hand_total(
    conn: &mut SqliteConnection,
    item_id: &ItemId,
    location_id: &LocationId,
) -> DbResult<i64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(on_hand), 0) FROM inventory_balances WHERE item_id = ?1 AND location_id = ?2",
    )
    .bind(item_id)
    .bind(location_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(total)
}

async fn save(conn: &mut SqliteConnection, balance: &InventoryBalance) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory_balances (
            item_id, location_id, bin_key,
            on_hand, available, committed, on_order, in_transit, reserved, backordered,
            average_cost, last_movement_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT (item_id, location_id, bin_key) DO UPDATE SET
            on_hand = excluded.on_hand,
            available = excluded.available,
            committed = excluded.committed,
            on_order = excluded.on_order,
            in_transit = excluded.in_transit,
            reserved = excluded.reserved,
            backordered = excluded.backordered,
            average_cost = excluded.average_cost,
            last_movement_at = excluded.last_movement_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&balance.item_id)
    .bind(&balance.location_id)
    .bind(bin_key(balance.bin_id.as_ref()))
    .bind(balance.on_hand)
    .bind(balance.available)
    .bind(balance.committed)
    .bind(balance.on_order)
    .bind(balance.in_transit)
    .bind(balance.reserved)
    .bind(balance.backordered)
    .bind(balance.average_cost)
    .bind(balance.last_movement_at)
    .bind(balance.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Find-or-create the row and apply a signed delta to one quantity class.
///
/// Must run inside the transaction that makes the matching layer change.
pub async fn apply_delta(
    conn: &mut SqliteConnection,
    item_id: &ItemId,
    location_id: &LocationId,
    bin_id: Option<&BinId>,
    class: QuantityClass,
    delta: i64,
    now: DateTime<Utc>,
) -> DbResult<InventoryBalance> {
    let mut balance = get(conn, item_id, location_id, bin_id)
        .await?
        .unwrap_or_else(|| {
            InventoryBalance::new(item_id.clone(), location_id.clone(), bin_id.cloned())
        });

    apply_core_delta(&mut balance, class, delta, now)?;

    debug!(
        item_id = %item_id,
        location_id = %location_id,
        bin = bin_key(bin_id),
        class = %class,
        delta,
        on_hand = balance.on_hand,
        available = balance.available,
        "Balance delta applied"
    );

    save(conn, &balance).await?;
    Ok(balance)
}

/// Recomputes the location-level row's average cost from the layers.
///
/// Keeps the previous average when no available stock remains.
pub async fn refresh_average_cost(
    conn: &mut SqliteConnection,
    item_id: &ItemId,
    location_id: &LocationId,
    now: DateTime<Utc>,
) -> DbResult<InventoryBalance> {
    let layers = cost_layer::list(conn, item_id, location_id).await?;
    let mut balance = get(conn, item_id, location_id, None)
        .await?
        .unwrap_or_else(|| InventoryBalance::new(item_id.clone(), location_id.clone(), None));

    if let Some(average) = average_cost(&layers) {
        balance.average_cost = average;
    }
    balance.updated_at = now;

    debug!(
        item_id = %item_id,
        location_id = %location_id,
        average_cost = %balance.average_cost,
        "Average cost refreshed"
    );

    save(conn, &balance).await?;
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DbError, ErrorClass};
    use crate::pool::{Database, DbConfig};

    async fn setup() -> (Database, ItemId, LocationId) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let item = db.catalog().register_item("SKU-1", "Item").await.unwrap();
        let loc = db.catalog().register_location("MAIN", "Main").await.unwrap();
        (db, item.id, loc.id)
    }

    #[tokio::test]
    async fn test_row_created_lazily_and_available_derived() {
        let (db, item, loc) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();

        assert!(get(&mut conn, &item, &loc, None).await.unwrap().is_none());

        apply_delta(&mut conn, &item, &loc, None, QuantityClass::OnHand, 12, now)
            .await
            .unwrap();
        let balance =
            apply_delta(&mut conn, &item, &loc, None, QuantityClass::Reserved, 4, now)
                .await
                .unwrap();
        assert_eq!(balance.available, 8);

        let stored = get(&mut conn, &item, &loc, None).await.unwrap().unwrap();
        assert_eq!(stored, balance);
    }

    #[tokio::test]
    async fn test_bins_are_separate_rows() {
        let (db, item, loc) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();
        let bin = BinId::from("A-01-03");

        apply_delta(&mut conn, &item, &loc, None, QuantityClass::OnHand, 5, now)
            .await
            .unwrap();
        apply_delta(&mut conn, &item, &loc, Some(&bin), QuantityClass::OnHand, 7, now)
            .await
            .unwrap();

        let rows = list_for_pair(&mut conn, &item, &loc).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].bin_id, None);
        assert_eq!(rows[1].bin_id, Some(bin));
        assert_eq!(on_hand_total(&mut conn, &item, &loc).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_negative_commitment_rejected_without_write() {
        let (db, item, loc) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();

        let err = apply_delta(&mut conn, &item, &loc, None, QuantityClass::Committed, -1, now)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));
        assert_eq!(err.class(), ErrorClass::Validation);
        assert!(get(&mut conn, &item, &loc, None).await.unwrap().is_none());
    }
}

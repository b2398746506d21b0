//! # Catalog Repository
//!
//! Identity resolution for items and locations. The ledger only needs to
//! know that an id exists and is active; everything else about an item lives
//! in the surrounding catalog.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use strata_core::validation::{validate_location_code, validate_name, validate_sku};
use strata_core::{CoreError, Item, ItemId, Location, LocationId};

/// Repository for item and location registration.
///
/// ## Usage
/// ```rust,ignore
/// let catalog = db.catalog();
/// let main = catalog.register_location("MAIN", "Main warehouse").await?;
/// let bolt = catalog.register_item("BOLT-M8", "M8 hex bolt").await?;
/// ```
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    pub async fn register_item(&self, sku: &str, name: &str) -> DbResult<Item> {
        validate_sku(sku)?;
        validate_name("item name", name)?;

        let item = Item {
            id: ItemId::generate(),
            sku: sku.trim().to_string(),
            name: name.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %item.id, sku = %item.sku, "Registering item");

        let result = sqlx::query(
            "INSERT INTO items (id, sku, name, is_active, created_at) VALUES (?1, ?2, ?3, 1, ?4)",
        )
        .bind(&item.id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!(id = %item.id, sku = %item.sku, "Item registered");
                Ok(item)
            }
            Err(err) => match DbError::from(err) {
                DbError::UniqueViolation { .. } => Err(DbError::duplicate("sku", item.sku)),
                other => Err(other),
            },
        }
    }

    pub async fn register_location(&self, code: &str, name: &str) -> DbResult<Location> {
        validate_location_code(code)?;
        validate_name("location name", name)?;

        let location = Location {
            id: LocationId::generate(),
            code: code.trim().to_string(),
            name: name.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %location.id, code = %location.code, "Registering location");

        let result = sqlx::query(
            "INSERT INTO locations (id, code, name, is_active, created_at) VALUES (?1, ?2, ?3, 1, ?4)",
        )
        .bind(&location.id)
        .bind(&location.code)
        .bind(&location.name)
        .bind(location.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!(id = %location.id, code = %location.code, "Location registered");
                Ok(location)
            }
            Err(err) => match DbError::from(err) {
                DbError::UniqueViolation { .. } => {
                    Err(DbError::duplicate("location code", location.code))
                }
                other => Err(other),
            },
        }
    }

    /// Soft-deactivates an item. Existing layers stay valued; new movements
    /// are rejected.
    pub async fn deactivate_item(&self, id: &ItemId) -> DbResult<()> {
        let result = sqlx::query("UPDATE items SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }

        info!(id = %id, "Item deactivated");
        Ok(())
    }

    pub async fn deactivate_location(&self, id: &LocationId) -> DbResult<()> {
        let result = sqlx::query("UPDATE locations SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Location", id));
        }

        info!(id = %id, "Location deactivated");
        Ok(())
    }

    pub async fn get_item(&self, id: &ItemId) -> DbResult<Option<Item>> {
        let mut conn = self.pool.acquire().await?;
        get_item(&mut conn, id).await
    }

    pub async fn get_location(&self, id: &LocationId) -> DbResult<Option<Location>> {
        let mut conn = self.pool.acquire().await?;
        get_location(&mut conn, id).await
    }

    pub async fn item_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

pub async fn get_item(conn: &mut SqliteConnection, id: &ItemId) -> DbResult<Option<Item>> {
    let item = sqlx::query_as::<_, Item>(
        "SELECT id, sku, name, is_active, created_at FROM items WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(item)
}

pub async fn get_location(
    conn: &mut SqliteConnection,
    id: &LocationId,
) -> DbResult<Option<Location>> {
    let location = sqlx::query_as::<_, Location>(
        "SELECT id, code, name, is_active, created_at FROM locations WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(location)
}

/// Resolves an item that may receive new movements.
pub async fn require_active_item(conn: &mut SqliteConnection, id: &ItemId) -> DbResult<Item> {
    let item = get_item(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Item", id))?;

    if !item.is_active {
        return Err(CoreError::inactive("Item", id).into());
    }

    Ok(item)
}

/// Resolves a location that may receive new movements.
pub async fn require_active_location(
    conn: &mut SqliteConnection,
    id: &LocationId,
) -> DbResult<Location> {
    let location = get_location(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Location", id))?;

    if !location.is_active {
        return Err(CoreError::inactive("Location", id).into());
    }

    Ok(location)
}

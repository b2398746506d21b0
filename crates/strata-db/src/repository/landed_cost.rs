//! # Landed Cost Repository
//!
//! Landed cost headers, their per-line allocations, and the revision trail
//! written by explicit layer revaluations.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use strata_core::allocation::AllocationPlan;
use strata_core::{
    AllocationId, AllocationMethod, CostCategory, CoreError, CostLayerId, LandedCost,
    LandedCostAllocation, LandedCostId, LayerCostRevision, Money, ReceiptId, RevisionId, UnitCost,
};

#[derive(Debug, sqlx::FromRow)]
struct LandedCostRow {
    id: LandedCostId,
    receipt_id: ReceiptId,
    category: CostCategory,
    total_cost: Money,
    method: AllocationMethod,
    effective_method: AllocationMethod,
    created_at: DateTime<Utc>,
}

impl LandedCostRow {
    fn with_allocations(self, allocations: Vec<LandedCostAllocation>) -> LandedCost {
        LandedCost {
            id: self.id,
            receipt_id: self.receipt_id,
            category: self.category,
            total_cost: self.total_cost,
            method: self.method,
            effective_method: self.effective_method,
            created_at: self.created_at,
            allocations,
        }
    }
}

const ALLOCATION_COLUMNS: &str = r#"
    id, landed_cost_id, receipt_line_id, cost_layer_id,
    allocated_amount, share_bps, quantity, original_unit_cost, adjusted_unit_cost
"#;

/// Layer unit cost before and after one allocation share was applied.
#[derive(Debug, Clone)]
pub struct AppliedShare {
    pub original_unit_cost: UnitCost,
    pub adjusted_unit_cost: UnitCost,
}

/// Stores the header and one allocation per share.
///
/// `applied[i]` holds the layer cost before and after `plan.shares[i]`.
pub async fn insert(
    conn: &mut SqliteConnection,
    receipt_id: &ReceiptId,
    category: CostCategory,
    total_cost: Money,
    plan: &AllocationPlan,
    applied: &[AppliedShare],
    now: DateTime<Utc>,
) -> DbResult<LandedCost> {
    if applied.len() != plan.shares.len() {
        return Err(CoreError::invariant(format!(
            "{} allocation shares but {} applied layer costs",
            plan.shares.len(),
            applied.len()
        ))
        .into());
    }

    let id = LandedCostId::generate();

    sqlx::query(
        r#"
        INSERT INTO landed_costs (
            id, receipt_id, category, total_cost, method, effective_method, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&id)
    .bind(receipt_id)
    .bind(category)
    .bind(total_cost)
    .bind(plan.requested_method)
    .bind(plan.effective_method)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    for (share, costs) in plan.shares.iter().zip(applied) {
        sqlx::query(
            r#"
            INSERT INTO landed_cost_allocations (
                id, landed_cost_id, receipt_line_id, cost_layer_id,
                allocated_amount, share_bps, quantity, original_unit_cost, adjusted_unit_cost
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(AllocationId::generate())
        .bind(&id)
        .bind(&share.receipt_line_id)
        .bind(&share.cost_layer_id)
        .bind(share.amount)
        .bind(share.share_bps)
        .bind(share.quantity)
        .bind(costs.original_unit_cost)
        .bind(costs.adjusted_unit_cost)
        .execute(&mut *conn)
        .await?;
    }

    debug!(
        landed_cost_id = %id,
        receipt_id = %receipt_id,
        allocations = plan.shares.len(),
        "Landed cost stored"
    );

    require(conn, &id).await
}

async fn allocations(
    conn: &mut SqliteConnection,
    landed_cost_id: &LandedCostId,
) -> DbResult<Vec<LandedCostAllocation>> {
    let sql = format!(
        "SELECT {} FROM landed_cost_allocations WHERE landed_cost_id = ?1 ORDER BY rowid",
        ALLOCATION_COLUMNS
    );
    let rows = sqlx::query_as::<_, LandedCostAllocation>(&sql)
        .bind(landed_cost_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows)
}

pub async fn get(conn: &mut SqliteConnection, id: &LandedCostId) -> DbResult<Option<LandedCost>> {
    let row = sqlx::query_as::<_, LandedCostRow>(
        r#"
        SELECT id, receipt_id, category, total_cost, method, effective_method, created_at
        FROM landed_costs
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let allocations = allocations(conn, &row.id).await?;
            Ok(Some(row.with_allocations(allocations)))
        }
        None => Ok(None),
    }
}

pub async fn require(conn: &mut SqliteConnection, id: &LandedCostId) -> DbResult<LandedCost> {
    get(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("LandedCost", id).into())
}

/// Landed costs applied to a receipt, oldest first.
pub async fn for_receipt(
    conn: &mut SqliteConnection,
    receipt_id: &ReceiptId,
) -> DbResult<Vec<LandedCost>> {
    let rows = sqlx::query_as::<_, LandedCostRow>(
        r#"
        SELECT id, receipt_id, category, total_cost, method, effective_method, created_at
        FROM landed_costs
        WHERE receipt_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(receipt_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut landed = Vec::with_capacity(rows.len());
    for row in rows {
        let allocations = allocations(conn, &row.id).await?;
        landed.push(row.with_allocations(allocations));
    }
    Ok(landed)
}

pub async fn insert_revision(
    conn: &mut SqliteConnection,
    cost_layer_id: &CostLayerId,
    previous_unit_cost: UnitCost,
    new_unit_cost: UnitCost,
    reason: &str,
    now: DateTime<Utc>,
) -> DbResult<LayerCostRevision> {
    let revision = LayerCostRevision {
        id: RevisionId::generate(),
        cost_layer_id: cost_layer_id.clone(),
        previous_unit_cost,
        new_unit_cost,
        reason: reason.to_string(),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO layer_cost_revisions (
            id, cost_layer_id, previous_unit_cost, new_unit_cost, reason, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&revision.id)
    .bind(&revision.cost_layer_id)
    .bind(revision.previous_unit_cost)
    .bind(revision.new_unit_cost)
    .bind(&revision.reason)
    .bind(revision.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(revision)
}

pub async fn revisions_for_layer(
    conn: &mut SqliteConnection,
    cost_layer_id: &CostLayerId,
) -> DbResult<Vec<LayerCostRevision>> {
    let revisions = sqlx::query_as::<_, LayerCostRevision>(
        r#"
        SELECT id, cost_layer_id, previous_unit_cost, new_unit_cost, reason, created_at
        FROM layer_cost_revisions
        WHERE cost_layer_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(cost_layer_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(revisions)
}

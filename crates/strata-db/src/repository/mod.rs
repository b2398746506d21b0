//! # Repository Module
//!
//! Database repository implementations for the ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories Over One Connection                     │
//! │                                                                         │
//! │  InventoryLedger::ship_transfer(id)                                    │
//! │       │                                                                 │
//! │       │  let mut tx = db.begin_write().await?;                         │
//! │       ▼                                                                 │
//! │  transfer::get(&mut tx, id)                                            │
//! │  consumption::consume_fifo(&mut tx, ...)   ─┐                          │
//! │  balance::apply_delta(&mut tx, ...)         ├─ same connection,        │
//! │  transfer::set_status(&mut tx, ...)        ─┘  same transaction        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tx.commit().await?    (any `?` before this drops tx → rollback)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Functions take `&mut SqliteConnection` so they compose inside a caller's
//! transaction. Reads outside a transaction pass a pooled connection.
//!
//! ## Available Repositories
//!
//! - [`catalog`] - Items and locations (identity + active flag)
//! - [`cost_layer`] - Cost layer rows
//! - [`consumption`] - FIFO draws, consumption audit trail, reversals
//! - [`balance`] - Inventory balance rows
//! - [`receipt`] - Received purchases
//! - [`landed_cost`] - Landed cost headers, allocations, cost revisions
//! - [`adjustment`] - Quantity adjustments
//! - [`transfer`] - Inter-location transfers

pub mod adjustment;
pub mod balance;
pub mod catalog;
pub mod consumption;
pub mod cost_layer;
pub mod landed_cost;
pub mod receipt;
pub mod transfer;

//! # strata-db: Ledger Store for Strata
//!
//! SQLite persistence and units of work for the FIFO cost layer ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Strata Data Flow                                 │
//! │                                                                         │
//! │  Caller (receiving, fulfillment, counts, admin)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     strata-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │InventoryLedger│    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (ledger/)    │───►│ cost_layer    │    │  (embedded)  │  │   │
//! │  │   │               │    │ consumption   │    │              │  │   │
//! │  │   │ one write tx  │    │ balance, ...  │    │ 001_init.sql │  │   │
//! │  │   │ per operation │    │               │    │              │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           │    strata-core     │                               │   │
//! │  │           └──► fifo, allocation, balance, workflow (pure)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and write transactions
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`config`] - Configuration file and environment overrides
//! - [`repository`] - Row-level operations over one connection
//! - [`ledger`] - Costing operations and document orchestration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use strata_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/strata.db")).await?;
//! let main = db.catalog().register_location("MAIN", "Main warehouse").await?;
//! let ledger = db.ledger();
//! let value = ledger.total_inventory_value(None, Some(&main.id)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{init_tracing, ConfigError, LedgerConfig};
pub use error::{DbError, DbResult, ErrorClass};
pub use ledger::{InventoryLedger, ReversedDraw};
pub use pool::{Database, DbConfig, WriteTx};

pub use repository::catalog::CatalogRepository;
pub use repository::consumption::ConsumptionReversal;

//! # strata-core: Pure Costing Logic for Strata
//!
//! This crate holds the costing rules of the Strata inventory ledger as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Strata Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Surrounding workflow code (PO / SO / WMS)          │   │
//! │  │     items received ─ inventory adjusted ─ transfer shipped      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            strata-db (InventoryLedger, repositories)            │   │
//! │  │         one SQLite write transaction per business operation     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ strata-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌─────────┐ ┌────────┐ │   │
//! │  │   │  types  │ │  money  │ │   fifo    │ │ balance │ │workflow│ │   │
//! │  │   │  Layer  │ │  Money  │ │ plan_fifo │ │ deltas  │ │ status │ │   │
//! │  │   │ Balance │ │UnitCost │ │allocation │ │ average │ │ guards │ │   │
//! │  │   └─────────┘ └─────────┘ └───────────┘ └─────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (CostLayer, LayerConsumption, InventoryBalance, ...)
//! - [`money`] - Fixed-point `Money` (cents) and `UnitCost` (4 dp)
//! - [`fifo`] - FIFO draw planning
//! - [`allocation`] - Landed cost distribution
//! - [`balance`] - Balance delta math and average cost
//! - [`workflow`] - Adjustment and transfer state machines
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use strata_core::allocation::{distribute_landed_cost, AllocationLine};
//! use strata_core::{AllocationMethod, CostLayerId, Money, ReceiptLineId, UnitCost};
//!
//! let lines = vec![
//!     AllocationLine {
//!         receipt_line_id: ReceiptLineId::from("a"),
//!         cost_layer_id: CostLayerId::from("la"),
//!         quantity: 10,
//!         unit_cost: UnitCost::from_cents(500),
//!         weight_grams: None,
//!     },
//!     AllocationLine {
//!         receipt_line_id: ReceiptLineId::from("b"),
//!         cost_layer_id: CostLayerId::from("lb"),
//!         quantity: 10,
//!         unit_cost: UnitCost::from_cents(1500),
//!         weight_grams: None,
//!     },
//! ];
//!
//! let plan = distribute_landed_cost(Money::from_cents(2000), AllocationMethod::Value, &lines).unwrap();
//! assert_eq!(plan.shares[0].amount.cents(), 500);
//! assert_eq!(plan.shares[1].amount.cents(), 1500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod balance;
pub mod error;
pub mod fifo;
pub mod money;
pub mod types;
pub mod validation;
pub mod workflow;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use fifo::{ConsumptionResult, FifoPlan, LayerDraw};
pub use money::{Money, UnitCost};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a free-text reason (adjustments, voids, revaluations).
pub const MAX_REASON_LEN: usize = 500;

/// Maximum lines on one receipt, adjustment or transfer.
///
/// Every line of a document is applied inside one write transaction; the cap
/// bounds how long that transaction holds the write lock.
pub const MAX_LINES_PER_DOCUMENT: usize = 500;

//! # Domain Types
//!
//! Core domain types used throughout Strata.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   CostLayer     │   │LayerConsumption │   │InventoryBalance │       │
//! │  │  ─────────────  │◄──│  ─────────────  │   │  ─────────────  │       │
//! │  │  item+location  │   │  layer (FK)     │   │  item+location  │       │
//! │  │  remaining      │   │  TransactionRef │   │  on_hand        │       │
//! │  │  unit_cost      │   │  reversal links │   │  available ...  │       │
//! │  └────────▲────────┘   └─────────────────┘   └─────────────────┘       │
//! │           │                                                             │
//! │  ┌────────┴────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  ReceiptLine    │◄──│   LandedCost    │   │ Adjustment /    │       │
//! │  │  cost_layer_id  │   │   allocations   │   │ Transfer        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariant Carried By These Types
//! For each (item, location): Σ `quantity_remaining` of non-voided `available`
//! layers == Σ `on_hand` of that pair's balance rows, at every commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::{Money, UnitCost};

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
        #[cfg_attr(feature = "sqlx", sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generates a new random identifier (UUID v4).
            pub fn generate() -> Self {
                $name(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Stock-keeping item.
    ItemId
);
string_id!(
    /// Warehouse / store location.
    LocationId
);
string_id!(
    /// Bin inside a location (balances only; layers are location-scoped).
    BinId
);
string_id!(CostLayerId);
string_id!(ConsumptionId);
string_id!(ReceiptId);
string_id!(ReceiptLineId);
string_id!(LandedCostId);
string_id!(AllocationId);
string_id!(AdjustmentId);
string_id!(AdjustmentLineId);
string_id!(TransferId);
string_id!(TransferLineId);
string_id!(
    /// Sales-order fulfillment that drew stock.
    FulfillmentId
);
string_id!(
    /// Physical count that produced a variance.
    PhysicalCountId
);
string_id!(RevisionId);

// =============================================================================
// Catalog (identity resolution)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Item {
    pub id: ItemId,
    pub sku: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Location {
    pub id: LocationId,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cost Layer
// =============================================================================

/// How a layer came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    /// Purchase receipt acceptance.
    Receipt,
    /// Positive quantity adjustment.
    Adjustment,
    /// Inter-location transfer arriving at its destination.
    TransferIn,
}

/// Quality status of a layer. Only `Available` is consumable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    #[default]
    Available,
    Quarantine,
    Damaged,
    Expired,
}

impl QualityStatus {
    pub fn is_consumable(&self) -> bool {
        matches!(self, QualityStatus::Available)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityStatus::Available => "available",
            QualityStatus::Quarantine => "quarantine",
            QualityStatus::Damaged => "damaged",
            QualityStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One batch of stock acquired at one unit cost.
///
/// ## Mutability
/// ```text
/// quantity_received   immutable
/// receipt_date        immutable (FIFO key)
/// original_unit_cost  immutable
/// quantity_remaining  consumption / consumption reversal only
/// unit_cost           landed cost allocation / explicit revaluation only
/// voided              terminal
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CostLayer {
    pub id: CostLayerId,
    /// Insertion order. Breaks receipt-date ties deterministically.
    pub sequence: i64,
    pub item_id: ItemId,
    pub location_id: LocationId,
    /// Receipt line, adjustment or transfer that created the layer; for re-created
    /// units, the reversed consumption.
    pub source_reference: Option<String>,
    pub layer_type: LayerType,
    pub quantity_received: i64,
    pub quantity_remaining: i64,
    pub unit_cost: UnitCost,
    pub original_unit_cost: UnitCost,
    /// Accumulated landed cost per unit added on top of the original cost.
    pub landed_cost_per_unit: UnitCost,
    pub receipt_date: DateTime<Utc>,
    pub quality_status: QualityStatus,
    pub voided: bool,
    pub void_reason: Option<String>,
    pub voided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CostLayer {
    /// Whether a FIFO draw may select this layer.
    pub fn is_consumable(&self) -> bool {
        !self.voided && self.quality_status.is_consumable() && self.quantity_remaining > 0
    }

    /// Whether the remaining quantity counts toward on-hand.
    pub fn counts_on_hand(&self) -> bool {
        !self.voided && self.quality_status.is_consumable()
    }

    /// Value of what is left in the layer. Zero for voided layers.
    pub fn remaining_value(&self) -> Money {
        if self.voided {
            return Money::zero();
        }
        self.unit_cost.extend(self.quantity_remaining)
    }
}

/// Input for creating a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCostLayer {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub quantity: i64,
    pub unit_cost: UnitCost,
    pub receipt_date: DateTime<Utc>,
    pub layer_type: LayerType,
    pub source_reference: Option<String>,
    pub quality_status: QualityStatus,
}

// =============================================================================
// Transaction References
// =============================================================================

/// Kind of business operation that drew from a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Adjustment,
    Transfer,
    Fulfillment,
    PhysicalCount,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Adjustment => "adjustment",
            TransactionKind::Transfer => "transfer",
            TransactionKind::Fulfillment => "fulfillment",
            TransactionKind::PhysicalCount => "physical_count",
        }
    }
}

/// Typed reference to the operation behind a consumption.
///
/// Persisted as `(transaction_type, transaction_id)` and rebuilt through
/// [`TransactionRef::from_parts`], so every kind is handled exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TransactionRef {
    Adjustment(AdjustmentId),
    Transfer(TransferId),
    Fulfillment(FulfillmentId),
    PhysicalCount(PhysicalCountId),
}

impl TransactionRef {
    pub fn kind(&self) -> TransactionKind {
        match self {
            TransactionRef::Adjustment(_) => TransactionKind::Adjustment,
            TransactionRef::Transfer(_) => TransactionKind::Transfer,
            TransactionRef::Fulfillment(_) => TransactionKind::Fulfillment,
            TransactionRef::PhysicalCount(_) => TransactionKind::PhysicalCount,
        }
    }

    pub fn id_str(&self) -> &str {
        match self {
            TransactionRef::Adjustment(id) => id.as_str(),
            TransactionRef::Transfer(id) => id.as_str(),
            TransactionRef::Fulfillment(id) => id.as_str(),
            TransactionRef::PhysicalCount(id) => id.as_str(),
        }
    }

    pub fn from_parts(kind: TransactionKind, id: String) -> Self {
        match kind {
            TransactionKind::Adjustment => TransactionRef::Adjustment(AdjustmentId::from(id)),
            TransactionKind::Transfer => TransactionRef::Transfer(TransferId::from(id)),
            TransactionKind::Fulfillment => TransactionRef::Fulfillment(FulfillmentId::from(id)),
            TransactionKind::PhysicalCount => {
                TransactionRef::PhysicalCount(PhysicalCountId::from(id))
            }
        }
    }
}

impl fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.id_str())
    }
}

// =============================================================================
// Layer Consumption
// =============================================================================

/// Audit record of one draw against one layer.
///
/// A record is exactly one of: an original draw, a reversal (`reversal_of`
/// set), or a reversed original (`reversed_by` set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConsumption {
    pub id: ConsumptionId,
    pub cost_layer_id: CostLayerId,
    pub transaction: TransactionRef,
    /// Always positive. A reversal carries the same quantity as its original.
    pub quantity: i64,
    pub unit_cost: UnitCost,
    pub total_cost: Money,
    pub transaction_date: DateTime<Utc>,
    pub reversal_of: Option<ConsumptionId>,
    pub reversed_by: Option<ConsumptionId>,
}

impl LayerConsumption {
    pub fn is_reversal(&self) -> bool {
        self.reversal_of.is_some()
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed_by.is_some()
    }

    /// Quantity this record removes from its layer (negative for reversals).
    pub fn net_quantity(&self) -> i64 {
        if self.is_reversal() {
            -self.quantity
        } else {
            self.quantity
        }
    }
}

// =============================================================================
// Inventory Balance
// =============================================================================

/// Quantity field addressed by a balance delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityClass {
    OnHand,
    Committed,
    OnOrder,
    InTransit,
    Reserved,
    Backordered,
}

impl QuantityClass {
    /// Whether a change to this class requires recomputing `available`.
    pub fn affects_availability(&self) -> bool {
        matches!(
            self,
            QuantityClass::OnHand | QuantityClass::Committed | QuantityClass::Reserved
        )
    }

    /// Classes that only move together with cost layers.
    pub fn is_layer_driven(&self) -> bool {
        matches!(self, QuantityClass::OnHand | QuantityClass::InTransit)
    }

    /// Whether a change to this class counts as a stock movement.
    pub fn stamps_movement(&self) -> bool {
        matches!(self, QuantityClass::OnHand | QuantityClass::Committed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuantityClass::OnHand => "on_hand",
            QuantityClass::Committed => "committed",
            QuantityClass::OnOrder => "on_order",
            QuantityClass::InTransit => "in_transit",
            QuantityClass::Reserved => "reserved",
            QuantityClass::Backordered => "backordered",
        }
    }
}

impl fmt::Display for QuantityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per (item, location, bin) aggregate cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryBalance {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub bin_id: Option<BinId>,
    pub on_hand: i64,
    /// Always `on_hand - committed - reserved`; see [`crate::balance`].
    pub available: i64,
    pub committed: i64,
    pub on_order: i64,
    pub in_transit: i64,
    pub reserved: i64,
    pub backordered: i64,
    pub average_cost: UnitCost,
    pub last_movement_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryBalance {
    /// Empty balance row, as created lazily on first movement.
    pub fn new(item_id: ItemId, location_id: LocationId, bin_id: Option<BinId>) -> Self {
        InventoryBalance {
            item_id,
            location_id,
            bin_id,
            on_hand: 0,
            available: 0,
            committed: 0,
            on_order: 0,
            in_transit: 0,
            reserved: 0,
            backordered: 0,
            average_cost: UnitCost::zero(),
            last_movement_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn quantity(&self, class: QuantityClass) -> i64 {
        match class {
            QuantityClass::OnHand => self.on_hand,
            QuantityClass::Committed => self.committed,
            QuantityClass::OnOrder => self.on_order,
            QuantityClass::InTransit => self.in_transit,
            QuantityClass::Reserved => self.reserved,
            QuantityClass::Backordered => self.backordered,
        }
    }
}

/// Result of comparing layer remainders with the balance aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub item_id: ItemId,
    pub location_id: LocationId,
    /// Σ remaining over non-voided available layers.
    pub layer_quantity: i64,
    /// Σ on_hand across the pair's balance rows.
    pub on_hand: i64,
    pub in_sync: bool,
}

// =============================================================================
// Receipts
// =============================================================================

/// A received purchase (the "items received" event the ledger reacts to).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReceipt {
    pub id: ReceiptId,
    pub location_id: LocationId,
    /// External document number (PO receipt, ASN, ...). Stored for traceability.
    pub reference: Option<String>,
    pub received_at: DateTime<Utc>,
    pub lines: Vec<ItemReceiptLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ItemReceiptLine {
    pub id: ReceiptLineId,
    pub receipt_id: ReceiptId,
    pub item_id: ItemId,
    pub quantity_accepted: i64,
    pub unit_cost: UnitCost,
    /// Line weight in grams, when the supplier provided one.
    pub weight_grams: Option<i64>,
    pub quality_status: QualityStatus,
    pub cost_layer_id: Option<CostLayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReceipt {
    pub location_id: LocationId,
    pub reference: Option<String>,
    pub received_at: DateTime<Utc>,
    pub lines: Vec<NewReceiptLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReceiptLine {
    pub item_id: ItemId,
    pub quantity_accepted: i64,
    pub unit_cost: UnitCost,
    pub weight_grams: Option<i64>,
    pub quality_status: QualityStatus,
}

impl NewReceiptLine {
    /// Available line without weight data.
    pub fn new(item_id: ItemId, quantity_accepted: i64, unit_cost: UnitCost) -> Self {
        NewReceiptLine {
            item_id,
            quantity_accepted,
            unit_cost,
            weight_grams: None,
            quality_status: QualityStatus::Available,
        }
    }
}

// =============================================================================
// Landed Cost
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    Freight,
    Duty,
    Insurance,
    Handling,
    Other,
}

/// How a landed cost is spread over the receipt lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    /// By extended value (unit cost × quantity).
    Value,
    /// By accepted quantity.
    Quantity,
    /// By weight; falls back to `Quantity` when any line lacks weight.
    Weight,
}

impl AllocationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationMethod::Value => "value",
            AllocationMethod::Quantity => "quantity",
            AllocationMethod::Weight => "weight",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandedCost {
    pub id: LandedCostId,
    pub receipt_id: ReceiptId,
    pub category: CostCategory,
    pub total_cost: Money,
    /// Method the caller asked for.
    pub method: AllocationMethod,
    /// Method actually used (differs after a weight fallback).
    pub effective_method: AllocationMethod,
    pub created_at: DateTime<Utc>,
    pub allocations: Vec<LandedCostAllocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LandedCostAllocation {
    pub id: AllocationId,
    pub landed_cost_id: LandedCostId,
    pub receipt_line_id: ReceiptLineId,
    pub cost_layer_id: CostLayerId,
    pub allocated_amount: Money,
    /// Share of the total in basis points (2500 = 25%).
    pub share_bps: i64,
    pub quantity: i64,
    pub original_unit_cost: UnitCost,
    pub adjusted_unit_cost: UnitCost,
}

/// Append-only record of an explicit layer revaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LayerCostRevision {
    pub id: RevisionId,
    pub cost_layer_id: CostLayerId,
    pub previous_unit_cost: UnitCost,
    pub new_unit_cost: UnitCost,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Adjustments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStatus {
    #[default]
    Draft,
    Posted,
    Discarded,
}

impl AdjustmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentStatus::Draft => "draft",
            AdjustmentStatus::Posted => "posted",
            AdjustmentStatus::Discarded => "discarded",
        }
    }
}

impl fmt::Display for AdjustmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: AdjustmentId,
    pub location_id: LocationId,
    pub reason: String,
    pub status: AdjustmentStatus,
    /// Set on adjustments created by reversing another one.
    pub reversal_of: Option<AdjustmentId>,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub lines: Vec<AdjustmentLine>,
}

impl Adjustment {
    pub fn is_reversal(&self) -> bool {
        self.reversal_of.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AdjustmentLine {
    pub id: AdjustmentLineId,
    pub adjustment_id: AdjustmentId,
    pub line_number: i64,
    pub item_id: ItemId,
    /// Signed; never zero.
    pub quantity_change: i64,
    /// Cost of added units. Required for increases.
    pub unit_cost: Option<UnitCost>,
    /// Cost created or released by the line, set when posted.
    pub total_cost: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdjustmentLine {
    pub item_id: ItemId,
    pub quantity_change: i64,
    pub unit_cost: Option<UnitCost>,
}

impl NewAdjustmentLine {
    pub fn increase(item_id: ItemId, quantity: i64, unit_cost: UnitCost) -> Self {
        NewAdjustmentLine {
            item_id,
            quantity_change: quantity,
            unit_cost: Some(unit_cost),
        }
    }

    pub fn decrease(item_id: ItemId, quantity: i64) -> Self {
        NewAdjustmentLine {
            item_id,
            quantity_change: -quantity,
            unit_cost: None,
        }
    }
}

// =============================================================================
// Transfers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    #[default]
    Pending,
    InTransit,
    Received,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::InTransit => "in_transit",
            TransferStatus::Received => "received",
            TransferStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub source_location_id: LocationId,
    pub destination_location_id: LocationId,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub lines: Vec<TransferLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TransferLine {
    pub id: TransferLineId,
    pub transfer_id: TransferId,
    pub line_number: i64,
    pub item_id: ItemId,
    pub quantity: i64,
    /// FIFO cost released at the source, set when shipped.
    pub shipped_cost: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransferLine {
    pub item_id: ItemId,
    pub quantity: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ref_round_trips_through_parts() {
        let reference = TransactionRef::PhysicalCount(PhysicalCountId::from("count-7"));
        let rebuilt =
            TransactionRef::from_parts(reference.kind(), reference.id_str().to_string());
        assert_eq!(rebuilt, reference);
        assert_eq!(reference.to_string(), "physical_count:count-7");
    }

    #[test]
    fn test_voided_layer_has_no_value() {
        let now = Utc::now();
        let mut layer = CostLayer {
            id: CostLayerId::generate(),
            sequence: 1,
            item_id: ItemId::from("item"),
            location_id: LocationId::from("loc"),
            source_reference: None,
            layer_type: LayerType::Receipt,
            quantity_received: 5,
            quantity_remaining: 5,
            unit_cost: UnitCost::from_cents(400),
            original_unit_cost: UnitCost::from_cents(400),
            landed_cost_per_unit: UnitCost::zero(),
            receipt_date: now,
            quality_status: QualityStatus::Available,
            voided: false,
            void_reason: None,
            voided_at: None,
            created_at: now,
        };
        assert_eq!(layer.remaining_value(), Money::from_cents(2000));
        assert!(layer.is_consumable());

        layer.voided = true;
        assert_eq!(layer.remaining_value(), Money::zero());
        assert!(!layer.is_consumable());
        assert!(!layer.counts_on_hand());
    }

    #[test]
    fn test_quarantined_layer_is_not_consumable() {
        assert!(QualityStatus::Available.is_consumable());
        assert!(!QualityStatus::Quarantine.is_consumable());
        assert!(!QualityStatus::Damaged.is_consumable());
        assert!(!QualityStatus::Expired.is_consumable());
    }

    #[test]
    fn test_net_quantity_of_reversal_is_negative() {
        let original = LayerConsumption {
            id: ConsumptionId::from("c1"),
            cost_layer_id: CostLayerId::from("l1"),
            transaction: TransactionRef::Fulfillment(FulfillmentId::from("f1")),
            quantity: 4,
            unit_cost: UnitCost::from_cents(100),
            total_cost: Money::from_cents(400),
            transaction_date: Utc::now(),
            reversal_of: None,
            reversed_by: None,
        };
        let reversal = LayerConsumption {
            id: ConsumptionId::from("c2"),
            reversal_of: Some(original.id.clone()),
            ..original.clone()
        };
        assert_eq!(original.net_quantity(), 4);
        assert_eq!(reversal.net_quantity(), -4);
    }
}

//! # Validation Module
//!
//! Input validation for ledger operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Ledger entry point (strata-db::ledger)                       │
//! │  ├── THIS MODULE: quantities, costs, reasons, line sets                │
//! │  └── Runs before the write transaction touches any row                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Catalog checks (strata-db::repository::catalog)              │
//! │  └── Item / location exists and is active                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity_remaining BETWEEN 0 AND quantity_received)        │
//! │  ├── CHECK (reversal_of IS NULL OR reversed_by IS NULL)                │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use strata_core::validation::{validate_quantity, validate_reason};
//!
//! validate_quantity(12).unwrap();
//! validate_reason("cycle count variance").unwrap();
//! assert!(validate_quantity(0).is_err());
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::money::{Money, UnitCost};
use crate::types::{ItemId, LocationId};
use crate::{MAX_LINES_PER_DOCUMENT, MAX_REASON_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Alphanumeric, hyphens, underscores only
///
/// ```rust
/// use strata_core::validation::validate_sku;
///
/// assert!(validate_sku("BOLT-M8").is_ok());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "only letters, digits, '-' and '_' are allowed".to_string(),
        });
    }

    Ok(())
}

/// Validates a location code. Same alphabet as SKUs, shorter.
pub fn validate_location_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required("location code"));
    }

    if code.len() > 20 {
        return Err(ValidationError::TooLong {
            field: "location code".to_string(),
            max: 20,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "location code".to_string(),
            reason: "only letters, digits, '-' and '_' are allowed".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name for an item or location.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates the free-text reason on adjustments, voids and revaluations.
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::required("reason"));
    }

    if reason.len() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a movement quantity (layer creation, consumption, transfer line).
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }

    Ok(())
}

/// Validates a signed adjustment quantity. Zero changes nothing and is rejected.
pub fn validate_quantity_change(change: i64) -> ValidationResult<()> {
    if change == 0 {
        return Err(ValidationError::not_allowed(
            "quantity change",
            "must not be zero",
        ));
    }

    Ok(())
}

/// Validates a per-unit cost. Zero is allowed (free goods, samples).
pub fn validate_unit_cost(cost: UnitCost) -> ValidationResult<()> {
    if cost.is_negative() {
        return Err(ValidationError::must_not_be_negative("unit cost"));
    }

    Ok(())
}

/// Validates the total of a landed cost.
pub fn validate_landed_cost_total(total: Money) -> ValidationResult<()> {
    if !total.is_positive() {
        return Err(ValidationError::must_be_positive("landed cost total"));
    }

    Ok(())
}

/// Validates an optional line weight in grams.
pub fn validate_weight(weight_grams: Option<i64>) -> ValidationResult<()> {
    match weight_grams {
        Some(w) if w < 0 => Err(ValidationError::must_not_be_negative("weight")),
        _ => Ok(()),
    }
}

// =============================================================================
// Document Validators
// =============================================================================

/// Validates the number of lines on a receipt, adjustment or transfer.
pub fn validate_line_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::required("lines"));
    }

    if count > MAX_LINES_PER_DOCUMENT {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_LINES_PER_DOCUMENT as i64,
        });
    }

    Ok(())
}

/// Validates that each item appears at most once in a document.
pub fn validate_unique_items<'a>(items: impl IntoIterator<Item = &'a ItemId>) -> ValidationResult<()> {
    let mut seen = HashSet::new();
    for item in items {
        if !seen.insert(item) {
            return Err(ValidationError::not_allowed(
                "item",
                format!("{} appears on more than one line", item),
            ));
        }
    }

    Ok(())
}

/// Validates that a transfer moves stock between two different locations.
pub fn validate_distinct_locations(
    source: &LocationId,
    destination: &LocationId,
) -> ValidationResult<()> {
    if source == destination {
        return Err(ValidationError::not_allowed(
            "destination",
            "must differ from the source location",
        ));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("BOLT-M8").is_ok());
        assert!(validate_sku("widget_2").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_quantities() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());

        assert!(validate_quantity_change(-3).is_ok());
        assert!(validate_quantity_change(7).is_ok());
        assert!(validate_quantity_change(0).is_err());
    }

    #[test]
    fn test_validate_costs() {
        assert!(validate_unit_cost(UnitCost::zero()).is_ok());
        assert!(validate_unit_cost(UnitCost::from_cents(-1)).is_err());
        assert!(validate_landed_cost_total(Money::from_cents(1)).is_ok());
        assert!(validate_landed_cost_total(Money::zero()).is_err());
        assert!(validate_weight(None).is_ok());
        assert!(validate_weight(Some(-5)).is_err());
    }

    #[test]
    fn test_validate_reason() {
        assert!(validate_reason("damaged in aisle 4").is_ok());
        assert!(validate_reason("  ").is_err());
        assert!(validate_reason(&"x".repeat(MAX_REASON_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_document_lines() {
        assert!(validate_line_count(0).is_err());
        assert!(validate_line_count(1).is_ok());
        assert!(validate_line_count(MAX_LINES_PER_DOCUMENT + 1).is_err());

        let a = ItemId::from("a");
        let b = ItemId::from("b");
        assert!(validate_unique_items([&a, &b]).is_ok());
        assert!(validate_unique_items([&a, &b, &a]).is_err());

        let main = LocationId::from("main");
        let east = LocationId::from("east");
        assert!(validate_distinct_locations(&main, &east).is_ok());
        assert!(validate_distinct_locations(&main, &main).is_err());
    }
}

//! # Error Types
//!
//! Domain-specific error types for strata-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  strata-core errors (this file)                                        │
//! │  ├── CoreError        - Costing rule violations                        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  strata-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Costing and workflow rule violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A referenced item, location, layer or document does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Input failed validation before anything was mutated.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// FIFO candidates ran out before the requested quantity was drawn.
    ///
    /// ## Integrity Condition
    /// ```text
    /// Balance says on_hand = 30 ──► caller asks for 25 ──► layers hold 20
    ///                                                        │
    ///              balance and layers disagree ◄─────────────┘
    /// ```
    /// The aggregate claimed stock the layers cannot source. This is a data
    /// integrity condition and must be alerted on, not shown as a bad request.
    #[error(
        "Insufficient inventory for item {item_id} at {location_id}: requested {requested}, layers hold {available}"
    )]
    InsufficientInventory {
        item_id: String,
        location_id: String,
        requested: i64,
        available: i64,
    },

    /// Landed cost has nothing to be allocated against.
    #[error("Allocation failed: {reason}")]
    Allocation { reason: String },

    /// A document is not in a status that allows the requested action.
    #[error("{entity} {id} is {status}, cannot {action}")]
    InvalidTransition {
        entity: String,
        id: String,
        status: String,
        action: String,
    },

    /// Item or location exists but is deactivated.
    #[error("{entity} {id} is inactive")]
    Inactive { entity: String, id: String },

    /// A ledger invariant would be broken by the operation.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl CoreError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn allocation(reason: impl Into<String>) -> Self {
        CoreError::Allocation {
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(
        entity: impl Into<String>,
        id: impl ToString,
        status: impl ToString,
        action: impl Into<String>,
    ) -> Self {
        CoreError::InvalidTransition {
            entity: entity.into(),
            id: id.to_string(),
            status: status.to_string(),
            action: action.into(),
        }
    }

    pub fn inactive(entity: impl Into<String>, id: impl ToString) -> Self {
        CoreError::Inactive {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        CoreError::InvariantViolation(msg.into())
    }

    /// True for conditions that mean stored state has drifted.
    pub fn is_integrity_fault(&self) -> bool {
        matches!(
            self,
            CoreError::InsufficientInventory { .. } | CoreError::InvariantViolation(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not accepted in the current context.
    #[error("{field} not allowed: {reason}")]
    NotAllowed { field: String, reason: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }

    pub fn must_not_be_negative(field: impl Into<String>) -> Self {
        ValidationError::MustNotBeNegative {
            field: field.into(),
        }
    }

    pub fn not_allowed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::NotAllowed {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientInventory {
            item_id: "WIDGET".to_string(),
            location_id: "MAIN".to_string(),
            requested: 25,
            available: 20,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient inventory for item WIDGET at MAIN: requested 25, layers hold 20"
        );

        let err = CoreError::invalid_transition("Transfer", "T-1", "received", "cancel");
        assert_eq!(err.to_string(), "Transfer T-1 is received, cannot cancel");
    }

    #[test]
    fn test_integrity_faults_are_distinct() {
        let insufficient = CoreError::InsufficientInventory {
            item_id: "a".into(),
            location_id: "b".into(),
            requested: 2,
            available: 1,
        };
        assert!(insufficient.is_integrity_fault());

        let validation: CoreError = ValidationError::must_be_positive("quantity").into();
        assert!(!validation.is_integrity_fault());
        assert!(matches!(validation, CoreError::Validation(_)));
    }
}

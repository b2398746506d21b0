//! # Document State Machines
//!
//! Status transitions for adjustments and transfers. The ledger checks a
//! transition here before opening any write, then stores the returned status.
//!
//! ```text
//! Adjustment:   Draft ──post──► Posted ──reverse──► (new Posted reversal)
//!                 └───discard──► Discarded
//!
//! Transfer:     Pending ──ship──► InTransit ──receive──► Received
//!                  │                  │
//!                  └────cancel────────┴──────► Cancelled
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{Adjustment, AdjustmentStatus, Transfer, TransferStatus};

// =============================================================================
// Adjustments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentAction {
    Post,
    Discard,
}

impl AdjustmentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentAction::Post => "post",
            AdjustmentAction::Discard => "discard",
        }
    }
}

impl AdjustmentStatus {
    /// Status reached by `action`, or `None` when not allowed.
    pub fn next(self, action: AdjustmentAction) -> Option<AdjustmentStatus> {
        match (self, action) {
            (AdjustmentStatus::Draft, AdjustmentAction::Post) => Some(AdjustmentStatus::Posted),
            (AdjustmentStatus::Draft, AdjustmentAction::Discard) => {
                Some(AdjustmentStatus::Discarded)
            }
            _ => None,
        }
    }
}

pub fn transition_adjustment(
    adjustment: &Adjustment,
    action: AdjustmentAction,
) -> CoreResult<AdjustmentStatus> {
    adjustment.status.next(action).ok_or_else(|| {
        CoreError::invalid_transition(
            "Adjustment",
            &adjustment.id,
            adjustment.status,
            action.as_str(),
        )
    })
}

/// Checks that `adjustment` may be reversed.
///
/// Only posted adjustments that are not reversals themselves and have no
/// reversal yet qualify.
pub fn ensure_reversible(adjustment: &Adjustment, already_reversed: bool) -> CoreResult<()> {
    if adjustment.status != AdjustmentStatus::Posted {
        return Err(CoreError::invalid_transition(
            "Adjustment",
            &adjustment.id,
            adjustment.status,
            "reverse",
        ));
    }
    if adjustment.is_reversal() {
        return Err(CoreError::invalid_transition(
            "Adjustment",
            &adjustment.id,
            "a reversal",
            "reverse",
        ));
    }
    if already_reversed {
        return Err(CoreError::invalid_transition(
            "Adjustment",
            &adjustment.id,
            "already reversed",
            "reverse",
        ));
    }
    Ok(())
}

// =============================================================================
// Transfers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferAction {
    Ship,
    Receive,
    Cancel,
}

impl TransferAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferAction::Ship => "ship",
            TransferAction::Receive => "receive",
            TransferAction::Cancel => "cancel",
        }
    }
}

impl TransferStatus {
    pub fn next(self, action: TransferAction) -> Option<TransferStatus> {
        match (self, action) {
            (TransferStatus::Pending, TransferAction::Ship) => Some(TransferStatus::InTransit),
            (TransferStatus::InTransit, TransferAction::Receive) => Some(TransferStatus::Received),
            (TransferStatus::Pending | TransferStatus::InTransit, TransferAction::Cancel) => {
                Some(TransferStatus::Cancelled)
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Received | TransferStatus::Cancelled)
    }
}

pub fn transition_transfer(transfer: &Transfer, action: TransferAction) -> CoreResult<TransferStatus> {
    transfer.status.next(action).ok_or_else(|| {
        CoreError::invalid_transition("Transfer", &transfer.id, transfer.status, action.as_str())
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AdjustmentId, LocationId, TransferId};
    use chrono::Utc;

    fn adjustment(status: AdjustmentStatus) -> Adjustment {
        Adjustment {
            id: AdjustmentId::from("adj-1"),
            location_id: LocationId::from("loc"),
            reason: "count".to_string(),
            status,
            reversal_of: None,
            created_at: Utc::now(),
            posted_at: None,
            lines: vec![],
        }
    }

    fn transfer(status: TransferStatus) -> Transfer {
        Transfer {
            id: TransferId::from("t-1"),
            source_location_id: LocationId::from("a"),
            destination_location_id: LocationId::from("b"),
            status,
            created_at: Utc::now(),
            shipped_at: None,
            received_at: None,
            cancelled_at: None,
            lines: vec![],
        }
    }

    #[test]
    fn test_adjustment_transitions() {
        let draft = adjustment(AdjustmentStatus::Draft);
        assert_eq!(
            transition_adjustment(&draft, AdjustmentAction::Post).unwrap(),
            AdjustmentStatus::Posted
        );
        assert_eq!(
            transition_adjustment(&draft, AdjustmentAction::Discard).unwrap(),
            AdjustmentStatus::Discarded
        );

        let posted = adjustment(AdjustmentStatus::Posted);
        let err = transition_adjustment(&posted, AdjustmentAction::Post).unwrap_err();
        assert_eq!(err.to_string(), "Adjustment adj-1 is posted, cannot post");
        assert!(transition_adjustment(&posted, AdjustmentAction::Discard).is_err());
        assert!(
            transition_adjustment(&adjustment(AdjustmentStatus::Discarded), AdjustmentAction::Post)
                .is_err()
        );
    }

    #[test]
    fn test_reversal_guards() {
        let posted = adjustment(AdjustmentStatus::Posted);
        assert!(ensure_reversible(&posted, false).is_ok());
        assert!(ensure_reversible(&posted, true).is_err());
        assert!(ensure_reversible(&adjustment(AdjustmentStatus::Draft), false).is_err());

        let mut reversal = adjustment(AdjustmentStatus::Posted);
        reversal.reversal_of = Some(AdjustmentId::from("adj-0"));
        let err = ensure_reversible(&reversal, false).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_transfer_transitions() {
        let pending = transfer(TransferStatus::Pending);
        assert_eq!(
            transition_transfer(&pending, TransferAction::Ship).unwrap(),
            TransferStatus::InTransit
        );
        assert!(transition_transfer(&pending, TransferAction::Receive).is_err());
        assert_eq!(
            transition_transfer(&pending, TransferAction::Cancel).unwrap(),
            TransferStatus::Cancelled
        );

        let in_transit = transfer(TransferStatus::InTransit);
        assert_eq!(
            transition_transfer(&in_transit, TransferAction::Receive).unwrap(),
            TransferStatus::Received
        );
        assert_eq!(
            transition_transfer(&in_transit, TransferAction::Cancel).unwrap(),
            TransferStatus::Cancelled
        );
        assert!(transition_transfer(&in_transit, TransferAction::Ship).is_err());

        let received = transfer(TransferStatus::Received);
        let err = transition_transfer(&received, TransferAction::Cancel).unwrap_err();
        assert_eq!(err.to_string(), "Transfer t-1 is received, cannot cancel");
        assert!(received.status.is_terminal());
    }
}

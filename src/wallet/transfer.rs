//! Transfer State Machine
//!
//! Status strings match the `transfers.status` column.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use uuid::Uuid;

/// Transfer saga states
///
/// Success path: `initiated → debited → credited` (terminal).
/// Failure path: `debited → compensated` (terminal, money restored to source).
/// Transitions are monotonic; a compensated transfer is never re-processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStatus {
    /// Transfer row recorded, no balance moved yet
    Initiated,

    /// Source debited - funds are IN-FLIGHT
    /// CRITICAL: Must eventually reach Credited or Compensated
    Debited,

    /// Terminal: destination credited, transfer complete
    Credited,

    /// Terminal: no balance moved (validation failure recorded)
    Failed,

    /// Terminal: source credited back after a lost credit phase
    Compensated,
}

impl TransferStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Credited | TransferStatus::Failed | TransferStatus::Compensated
        )
    }

    /// Check if funds are in-flight (source debited, destination not credited)
    #[inline]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TransferStatus::Debited)
    }

    /// Whether `next` is a legal forward transition from this state
    pub fn can_advance_to(&self, next: TransferStatus) -> bool {
        matches!(
            (self, next),
            (TransferStatus::Initiated, TransferStatus::Debited)
                | (TransferStatus::Initiated, TransferStatus::Failed)
                | (TransferStatus::Debited, TransferStatus::Credited)
                | (TransferStatus::Debited, TransferStatus::Compensated)
        )
    }

    /// Column value for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Initiated => "initiated",
            TransferStatus::Debited => "debited",
            TransferStatus::Credited => "credited",
            TransferStatus::Failed => "failed",
            TransferStatus::Compensated => "compensated",
        }
    }

    /// Parse a stored column value
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "initiated" => Some(TransferStatus::Initiated),
            "debited" => Some(TransferStatus::Debited),
            "credited" => Some(TransferStatus::Credited),
            "failed" => Some(TransferStatus::Failed),
            "compensated" => Some(TransferStatus::Compensated),
            _ => None,
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable record of saga progress for one cross-wallet transfer
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub id: Uuid,
    pub from_wallet_id: String,
    pub to_wallet_id: String,
    pub amount: Decimal,
    pub status: TransferStatus,
    pub request_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransferRecord {
    pub fn new(
        from_wallet_id: &str,
        to_wallet_id: &str,
        amount: Decimal,
        request_id: Option<&str>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            from_wallet_id: from_wallet_id.to_string(),
            to_wallet_id: to_wallet_id.to_string(),
            amount,
            status: TransferStatus::Initiated,
            request_id: request_id.map(str::to_string),
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TransferStatus::Credited.is_terminal());
        assert!(TransferStatus::Failed.is_terminal());
        assert!(TransferStatus::Compensated.is_terminal());

        assert!(!TransferStatus::Initiated.is_terminal());
        assert!(!TransferStatus::Debited.is_terminal());
    }

    #[test]
    fn test_in_flight_states() {
        assert!(TransferStatus::Debited.is_in_flight());

        assert!(!TransferStatus::Initiated.is_in_flight());
        assert!(!TransferStatus::Credited.is_in_flight());
        assert!(!TransferStatus::Compensated.is_in_flight());
    }

    #[test]
    fn test_monotonic_transitions() {
        assert!(TransferStatus::Initiated.can_advance_to(TransferStatus::Debited));
        assert!(TransferStatus::Debited.can_advance_to(TransferStatus::Credited));
        assert!(TransferStatus::Debited.can_advance_to(TransferStatus::Compensated));

        // No backwards or repeated transitions
        assert!(!TransferStatus::Credited.can_advance_to(TransferStatus::Debited));
        assert!(!TransferStatus::Compensated.can_advance_to(TransferStatus::Credited));
        assert!(!TransferStatus::Credited.can_advance_to(TransferStatus::Compensated));
        assert!(!TransferStatus::Initiated.can_advance_to(TransferStatus::Credited));
    }

    #[test]
    fn test_status_roundtrip() {
        let statuses = [
            TransferStatus::Initiated,
            TransferStatus::Debited,
            TransferStatus::Credited,
            TransferStatus::Failed,
            TransferStatus::Compensated,
        ];

        for status in statuses {
            let recovered = TransferStatus::from_str(status.as_str()).unwrap();
            assert_eq!(status, recovered);
        }

        assert!(TransferStatus::from_str("bogus").is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(TransferStatus::Initiated.to_string(), "initiated");
        assert_eq!(TransferStatus::Compensated.to_string(), "compensated");
    }
}

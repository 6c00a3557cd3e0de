//! Core ledger types: wallets, domain events, command results.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use super::transfer::TransferStatus;

/// A wallet row. Created lazily on first mutation, never deleted.
#[derive(Debug, Clone)]
pub struct Wallet {
    pub id: String,
    pub balance: Decimal,
    /// Bumped on every balance write; optimistic-concurrency witness
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Domain event types recorded in `wallet_events`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    FundsDeposited,
    FundsWithdrawn,
    TransferInitiated,
    TransferCompleted,
    TransferFailed,
    TransferCompensated,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::FundsDeposited => "FundsDeposited",
            EventType::FundsWithdrawn => "FundsWithdrawn",
            EventType::TransferInitiated => "TransferInitiated",
            EventType::TransferCompleted => "TransferCompleted",
            EventType::TransferFailed => "TransferFailed",
            EventType::TransferCompensated => "TransferCompensated",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "FundsDeposited" => Some(EventType::FundsDeposited),
            "FundsWithdrawn" => Some(EventType::FundsWithdrawn),
            "TransferInitiated" => Some(EventType::TransferInitiated),
            "TransferCompleted" => Some(EventType::TransferCompleted),
            "TransferFailed" => Some(EventType::TransferFailed),
            "TransferCompensated" => Some(EventType::TransferCompensated),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable append-only record of a balance-affecting occurrence.
///
/// Per-wallet creation order is causal order; there is no global ordering.
#[derive(Debug, Clone)]
pub struct WalletEvent {
    pub id: Uuid,
    pub wallet_id: String,
    pub event_type: EventType,
    pub amount: Decimal,
    pub metadata: Option<Value>,
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletEvent {
    pub fn new(
        wallet_id: &str,
        event_type: EventType,
        amount: Decimal,
        request_id: Option<&str>,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id: wallet_id.to_string(),
            event_type,
            amount,
            metadata,
            request_id: request_id.map(str::to_string),
            created_at: Utc::now(),
        }
    }
}

/// Outbound event payload, written to the outbox and published verbatim.
///
/// Field names are the wire contract with downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub wallet_id: String,
    pub amount: Decimal,
    pub event_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_wallet_id: Option<String>,
}

impl EventPayload {
    /// Payload for a plain deposit/withdraw event
    pub fn from_event(event: &WalletEvent) -> Self {
        Self {
            wallet_id: event.wallet_id.clone(),
            amount: event.amount,
            event_id: event.id,
            request_id: event.request_id.clone(),
            metadata: event.metadata.clone(),
            transfer_id: None,
            to_wallet_id: None,
        }
    }

    /// Payload for an event that belongs to a transfer saga
    pub fn from_transfer_event(event: &WalletEvent, transfer_id: Uuid, to_wallet_id: &str) -> Self {
        Self {
            transfer_id: Some(transfer_id),
            to_wallet_id: Some(to_wallet_id.to_string()),
            ..Self::from_event(event)
        }
    }
}

/// Result of a deposit or withdraw command
#[derive(Debug, Clone)]
pub struct WalletCommandResult {
    pub wallet_id: String,
    pub balance: Decimal,
    pub events: Vec<WalletEvent>,
}

/// Result of a transfer command (or a compensation)
#[derive(Debug, Clone)]
pub struct TransferCommandResult {
    pub wallet_id: String,
    pub to_wallet_id: String,
    /// Source wallet balance after the operation
    pub balance: Decimal,
    /// None when compensation found nothing to compensate
    pub transfer_id: Option<Uuid>,
    pub transfer_status: TransferStatus,
    pub events: Vec<WalletEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn event_type_roundtrip() {
        let types = [
            EventType::FundsDeposited,
            EventType::FundsWithdrawn,
            EventType::TransferInitiated,
            EventType::TransferCompleted,
            EventType::TransferFailed,
            EventType::TransferCompensated,
        ];
        for t in types {
            assert_eq!(EventType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(EventType::from_str("SomethingElse"), None);
    }

    #[test]
    fn payload_serializes_camel_case_and_omits_empty_fields() {
        let event = WalletEvent::new(
            "user-1",
            EventType::FundsDeposited,
            Decimal::from_str("100.0000").unwrap(),
            Some("req-1"),
            None,
        );
        let json = serde_json::to_value(EventPayload::from_event(&event)).unwrap();

        assert_eq!(json["walletId"], "user-1");
        assert_eq!(json["requestId"], "req-1");
        assert!(json.get("transferId").is_none());
        assert!(json.get("toWalletId").is_none());
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn transfer_payload_carries_saga_fields() {
        let event = WalletEvent::new(
            "alice",
            EventType::TransferCompleted,
            Decimal::from_str("30").unwrap(),
            None,
            None,
        );
        let transfer_id = Uuid::new_v4();
        let payload = EventPayload::from_transfer_event(&event, transfer_id, "bob");
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["toWalletId"], "bob");
        assert_eq!(json["transferId"], transfer_id.to_string());
    }
}

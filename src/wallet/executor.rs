//! Ledger Transaction Executor
//!
//! Deposit, withdraw and transfer, each executed as one database transaction
//! against the ledger store. Every balance mutation commits together with its
//! domain event and outbox row; a failed unit rolls back completely and
//! leaves no observable state.

use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::db::Database;
use crate::money;

use super::error::WalletError;
use super::store::{LedgerStore, order_wallet_ids};
use super::transfer::{TransferRecord, TransferStatus};
use super::types::{
    EventPayload, EventType, TransferCommandResult, WalletCommandResult, WalletEvent,
};

/// Hard cap on history page size
const MAX_HISTORY_LIMIT: i64 = 200;

/// Executes ledger commands as atomic units
pub struct LedgerExecutor {
    db: Arc<Database>,
}

impl LedgerExecutor {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn pool(&self) -> &PgPool {
        self.db.pool()
    }

    /// Deposit `amount` into a wallet, creating it if absent.
    pub async fn deposit(
        &self,
        wallet_id: &str,
        amount: Decimal,
        request_id: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<WalletCommandResult, WalletError> {
        let amount = money::normalize(amount)?;

        let mut tx = self.pool().begin().await?;

        let wallet = LedgerStore::lock_or_create_wallet(&mut *tx, wallet_id).await?;
        let new_balance = wallet.balance + amount;
        LedgerStore::save_balance(&mut *tx, wallet_id, new_balance).await?;

        let event = WalletEvent::new(
            wallet_id,
            EventType::FundsDeposited,
            amount,
            request_id,
            metadata,
        );
        LedgerStore::append_event(&mut *tx, &event).await?;
        Self::enqueue_event(&mut *tx, &event, None, None).await?;

        tx.commit().await?;

        info!(wallet_id, %amount, balance = %new_balance, "Deposit committed");
        Ok(WalletCommandResult {
            wallet_id: wallet_id.to_string(),
            balance: new_balance,
            events: vec![event],
        })
    }

    /// Withdraw `amount` from a wallet.
    ///
    /// `InsufficientFunds` rolls the unit back: no event, no outbox row.
    pub async fn withdraw(
        &self,
        wallet_id: &str,
        amount: Decimal,
        request_id: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<WalletCommandResult, WalletError> {
        let amount = money::normalize(amount)?;

        let mut tx = self.pool().begin().await?;

        let wallet = LedgerStore::lock_or_create_wallet(&mut *tx, wallet_id).await?;
        if wallet.balance < amount {
            return Err(WalletError::InsufficientFunds);
        }

        let new_balance = wallet.balance - amount;
        LedgerStore::save_balance(&mut *tx, wallet_id, new_balance).await?;

        let event = WalletEvent::new(
            wallet_id,
            EventType::FundsWithdrawn,
            amount,
            request_id,
            metadata,
        );
        LedgerStore::append_event(&mut *tx, &event).await?;
        Self::enqueue_event(&mut *tx, &event, None, None).await?;

        tx.commit().await?;

        info!(wallet_id, %amount, balance = %new_balance, "Withdrawal committed");
        Ok(WalletCommandResult {
            wallet_id: wallet_id.to_string(),
            balance: new_balance,
            events: vec![event],
        })
    }

    /// Move `amount` between two wallets as a single atomic unit.
    ///
    /// Wallet locks are acquired in fixed id order regardless of transfer
    /// direction, so opposite-direction transfers between the same pair can
    /// never deadlock. The transfer row walks `initiated → debited → credited`
    /// inside the unit; any failure rolls the whole unit back, including the
    /// initiated row.
    pub async fn transfer(
        &self,
        from_wallet_id: &str,
        to_wallet_id: &str,
        amount: Decimal,
        request_id: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<TransferCommandResult, WalletError> {
        if from_wallet_id == to_wallet_id {
            return Err(WalletError::InvalidRequest(
                "cannot transfer to the same wallet".into(),
            ));
        }

        let amount = money::normalize(amount)?;

        let mut tx = self.pool().begin().await?;

        // Fixed lock order, independent of semantic from/to direction
        let (first_id, second_id) = order_wallet_ids(from_wallet_id, to_wallet_id);
        let first = LedgerStore::lock_or_create_wallet(&mut *tx, first_id).await?;
        let second = LedgerStore::lock_or_create_wallet(&mut *tx, second_id).await?;

        let (from_wallet, to_wallet) = if first.id == from_wallet_id {
            (first, second)
        } else {
            (second, first)
        };

        let record = TransferRecord::new(from_wallet_id, to_wallet_id, amount, request_id);
        LedgerStore::insert_transfer(&mut *tx, &record).await?;

        let initiated = WalletEvent::new(
            from_wallet_id,
            EventType::TransferInitiated,
            amount,
            request_id,
            metadata.clone(),
        );
        LedgerStore::append_event(&mut *tx, &initiated).await?;
        Self::enqueue_event(&mut *tx, &initiated, Some(record.id), Some(to_wallet_id)).await?;

        if from_wallet.balance < amount {
            // Rolls back the whole unit, initiated row and event included
            return Err(WalletError::InsufficientFunds);
        }

        // Debit phase
        let from_balance = from_wallet.balance - amount;
        LedgerStore::save_balance(&mut *tx, from_wallet_id, from_balance).await?;
        LedgerStore::update_transfer_status(&mut *tx, record.id, TransferStatus::Debited, None)
            .await?;

        let debit_event = WalletEvent::new(
            from_wallet_id,
            EventType::FundsWithdrawn,
            amount,
            request_id,
            metadata.clone(),
        );

        // Credit phase
        let to_balance = to_wallet.balance + amount;
        LedgerStore::save_balance(&mut *tx, to_wallet_id, to_balance).await?;
        LedgerStore::update_transfer_status(&mut *tx, record.id, TransferStatus::Credited, None)
            .await?;

        let credit_event = WalletEvent::new(
            to_wallet_id,
            EventType::FundsDeposited,
            amount,
            request_id,
            metadata.clone(),
        );
        let completed_event = WalletEvent::new(
            from_wallet_id,
            EventType::TransferCompleted,
            amount,
            request_id,
            with_to_wallet(metadata, to_wallet_id),
        );

        for event in [&debit_event, &credit_event, &completed_event] {
            LedgerStore::append_event(&mut *tx, event).await?;
            Self::enqueue_event(&mut *tx, event, Some(record.id), Some(to_wallet_id)).await?;
        }

        tx.commit().await?;

        info!(
            from = from_wallet_id,
            to = to_wallet_id,
            %amount,
            transfer_id = %record.id,
            "Transfer credited"
        );

        Ok(TransferCommandResult {
            wallet_id: from_wallet_id.to_string(),
            to_wallet_id: to_wallet_id.to_string(),
            balance: from_balance,
            transfer_id: Some(record.id),
            transfer_status: TransferStatus::Credited,
            events: vec![initiated, debit_event, credit_event, completed_event],
        })
    }

    /// Current balance; a wallet that was never mutated reads as zero.
    pub async fn balance(&self, wallet_id: &str) -> Result<Decimal, WalletError> {
        let wallet = LedgerStore::get_wallet(self.pool(), wallet_id).await?;
        Ok(wallet.map(|w| w.balance).unwrap_or(Decimal::ZERO))
    }

    /// Event history for a wallet, newest first. `limit` is capped at 200.
    pub async fn history(
        &self,
        wallet_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<WalletEvent>, WalletError> {
        let offset = offset.max(0);
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        LedgerStore::get_events(self.pool(), wallet_id, offset, limit).await
    }

    async fn enqueue_event(
        tx: &mut sqlx::PgConnection,
        event: &WalletEvent,
        transfer_id: Option<uuid::Uuid>,
        to_wallet_id: Option<&str>,
    ) -> Result<(), WalletError> {
        let payload = match (transfer_id, to_wallet_id) {
            (Some(id), Some(to)) => EventPayload::from_transfer_event(event, id, to),
            _ => EventPayload::from_event(event),
        };
        let payload = serde_json::to_value(&payload)
            .map_err(|e| WalletError::Store(format!("Failed to serialize payload: {}", e)))?;

        LedgerStore::enqueue_outbox(tx, event.event_type.as_str(), &payload).await?;
        Ok(())
    }
}

/// Merge `toWalletId` into command metadata for the completion event.
fn with_to_wallet(metadata: Option<Value>, to_wallet_id: &str) -> Option<Value> {
    let mut map = match metadata {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    map.insert("toWalletId".into(), Value::String(to_wallet_id.into()));
    Some(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_to_wallet_merges_into_existing_metadata() {
        let metadata = serde_json::json!({ "source": "mobile" });
        let merged = with_to_wallet(Some(metadata), "bob").unwrap();
        assert_eq!(merged["source"], "mobile");
        assert_eq!(merged["toWalletId"], "bob");
    }

    #[test]
    fn with_to_wallet_handles_missing_metadata() {
        let merged = with_to_wallet(None, "bob").unwrap();
        assert_eq!(merged["toWalletId"], "bob");
    }
}

//! Saga Compensator
//!
//! Closes out transfers whose debit committed but whose credit cannot be
//! confirmed. Compensation credits the source wallet back, flips the transfer
//! to `compensated` and emits the failure events - all in one transaction,
//! idempotently: a missing or already-compensated transfer is never credited
//! twice.
//!
//! Invoked explicitly, or by the reconciliation worker sweeping `debited`
//! transfers older than a threshold. A transfer that failed inside a single
//! atomic unit rolled back completely and never reaches this path.

use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::money;

use super::error::WalletError;
use super::store::{LedgerStore, order_wallet_ids};
use super::transfer::TransferStatus;
use super::types::{EventPayload, EventType, TransferCommandResult, WalletEvent};

/// Failure reason recorded on compensated transfers
const REASON_CREDIT_FAILED: &str = "credit_failed";

pub struct SagaCompensator {
    db: Arc<Database>,
}

impl SagaCompensator {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Compensate a transfer left in `debited` state.
    ///
    /// Safe to invoke when there is nothing to compensate: returns a neutral
    /// `failed` result with no transfer id. An already-compensated transfer
    /// returns success without crediting again.
    pub async fn compensate(
        &self,
        from_wallet_id: &str,
        to_wallet_id: &str,
        amount: Decimal,
        request_id: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<TransferCommandResult, WalletError> {
        let amount = money::normalize(amount)?;

        let mut tx = self.db.pool().begin().await?;

        // Same fixed lock order as the executor
        let (first_id, second_id) = order_wallet_ids(from_wallet_id, to_wallet_id);
        let first = LedgerStore::lock_or_create_wallet(&mut *tx, first_id).await?;
        let second = LedgerStore::lock_or_create_wallet(&mut *tx, second_id).await?;

        let from_wallet = if first.id == from_wallet_id { first } else { second };

        let debited = LedgerStore::find_transfer_for_update(
            &mut *tx,
            from_wallet_id,
            to_wallet_id,
            amount,
            TransferStatus::Debited,
        )
        .await?;

        let Some(transfer) = debited else {
            // Repeated compensation attempt: already compensated is success,
            // nothing matching at all is a neutral no-op.
            let compensated = LedgerStore::find_transfer_for_update(
                &mut *tx,
                from_wallet_id,
                to_wallet_id,
                amount,
                TransferStatus::Compensated,
            )
            .await?;

            tx.commit().await?;

            return Ok(match compensated {
                Some(transfer) => {
                    debug!(transfer_id = %transfer.id, "Transfer already compensated");
                    TransferCommandResult {
                        wallet_id: from_wallet_id.to_string(),
                        to_wallet_id: to_wallet_id.to_string(),
                        balance: from_wallet.balance,
                        transfer_id: Some(transfer.id),
                        transfer_status: TransferStatus::Compensated,
                        events: vec![],
                    }
                }
                None => {
                    debug!(
                        from = from_wallet_id,
                        to = to_wallet_id,
                        "No debited transfer to compensate"
                    );
                    TransferCommandResult {
                        wallet_id: from_wallet_id.to_string(),
                        to_wallet_id: to_wallet_id.to_string(),
                        balance: from_wallet.balance,
                        transfer_id: None,
                        transfer_status: TransferStatus::Failed,
                        events: vec![],
                    }
                }
            });
        };

        // Credit the source back and close the saga
        let restored_balance = from_wallet.balance + amount;
        LedgerStore::save_balance(&mut *tx, from_wallet_id, restored_balance).await?;
        LedgerStore::update_transfer_status(
            &mut *tx,
            transfer.id,
            TransferStatus::Compensated,
            Some(REASON_CREDIT_FAILED),
        )
        .await?;

        let failed_event = WalletEvent::new(
            from_wallet_id,
            EventType::TransferFailed,
            amount,
            request_id,
            metadata.clone(),
        );
        let compensated_event = WalletEvent::new(
            from_wallet_id,
            EventType::TransferCompensated,
            amount,
            request_id,
            metadata,
        );

        for event in [&failed_event, &compensated_event] {
            LedgerStore::append_event(&mut *tx, event).await?;
            let payload = EventPayload::from_transfer_event(event, transfer.id, to_wallet_id);
            let payload = serde_json::to_value(&payload)
                .map_err(|e| WalletError::Store(format!("Failed to serialize payload: {}", e)))?;
            LedgerStore::enqueue_outbox(&mut *tx, event.event_type.as_str(), &payload).await?;
        }

        tx.commit().await?;

        info!(
            transfer_id = %transfer.id,
            from = from_wallet_id,
            %amount,
            "Transfer compensated, source balance restored"
        );

        Ok(TransferCommandResult {
            wallet_id: from_wallet_id.to_string(),
            to_wallet_id: to_wallet_id.to_string(),
            balance: restored_balance,
            transfer_id: Some(transfer.id),
            transfer_status: TransferStatus::Compensated,
            events: vec![failed_event, compensated_event],
        })
    }
}

/// Configuration for the reconciliation worker
#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    /// How often to scan for stuck transfers
    pub scan_interval: Duration,
    /// How long a transfer must sit in `debited` to be considered lost
    pub stale_threshold: Duration,
    /// Maximum transfers to compensate per scan
    pub batch_size: i64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(30),
            stale_threshold: Duration::from_secs(60),
            batch_size: 100,
        }
    }
}

/// Reconciliation Worker
///
/// Periodically scans for transfers stuck in `debited` and compensates them.
/// This is the only automatic path into compensation: a debit that committed
/// durably with no confirmed credit is, by definition, lost in flight.
pub struct ReconciliationWorker {
    compensator: Arc<SagaCompensator>,
    db: Arc<Database>,
    config: ReconciliationConfig,
}

impl ReconciliationWorker {
    pub fn new(
        compensator: Arc<SagaCompensator>,
        db: Arc<Database>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            compensator,
            db,
            config,
        }
    }

    /// Run the reconciliation loop forever.
    pub async fn run(&self) -> ! {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            stale_threshold_secs = self.config.stale_threshold.as_secs(),
            "Starting reconciliation worker"
        );

        loop {
            if let Err(e) = self.sweep_once().await {
                error!(error = %e, "Reconciliation sweep failed");
            }

            tokio::time::sleep(self.config.scan_interval).await;
        }
    }

    /// Run a single sweep; returns the number of transfers compensated.
    pub async fn sweep_once(&self) -> Result<usize, WalletError> {
        let stale = LedgerStore::find_stale_debited(
            self.db.pool(),
            self.config.stale_threshold.as_secs() as i64,
            self.config.batch_size,
        )
        .await?;

        if stale.is_empty() {
            debug!("No stale debited transfers found");
            return Ok(0);
        }

        warn!(count = stale.len(), "Found debited transfers to compensate");

        let mut compensated = 0;
        for transfer in &stale {
            match self
                .compensator
                .compensate(
                    &transfer.from_wallet_id,
                    &transfer.to_wallet_id,
                    transfer.amount,
                    transfer.request_id.as_deref(),
                    None,
                )
                .await
            {
                Ok(result) if result.transfer_status == TransferStatus::Compensated => {
                    compensated += 1;
                }
                Ok(result) => {
                    // Raced with a concurrent compensation or a late credit
                    debug!(
                        transfer_id = %transfer.id,
                        status = %result.transfer_status,
                        "Transfer no longer debited"
                    );
                }
                Err(e) => {
                    error!(
                        transfer_id = %transfer.id,
                        error = %e,
                        "Failed to compensate transfer"
                    );
                }
            }
        }

        if compensated > 0 {
            info!(count = compensated, "Compensated transfers this sweep");
        }

        Ok(compensated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciliation_config_default() {
        let config = ReconciliationConfig::default();
        assert_eq!(config.scan_interval, Duration::from_secs(30));
        assert_eq!(config.stale_threshold, Duration::from_secs(60));
        assert_eq!(config.batch_size, 100);
    }
}

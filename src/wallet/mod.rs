//! Wallet Ledger Core
//!
//! Balance mutations, domain events and saga state for a single-currency
//! wallet ledger.
//!
//! # Architecture
//!
//! ```text
//! command ──▶ LedgerExecutor ──▶ one transaction:
//!                                  lock wallets (fixed id order)
//!                                  mutate balance
//!                                  append wallet_events
//!                                  enqueue outbox_messages
//!                                  commit
//!
//! debited transfer, credit lost ──▶ SagaCompensator (idempotent refund)
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Co-transactional outbox**: an event row never commits without its
//!    outbox row, and vice versa
//! 2. **Fixed lock order**: for any two wallets, the id that sorts first is
//!    locked first, regardless of transfer direction
//! 3. **Non-negative balances**: checked in the executor and enforced again
//!    by the `balance >= 0` column constraint
//! 4. **Monotonic saga states**: `initiated → debited → credited`, with
//!    `debited → compensated` as the only failure exit that moves money

pub mod compensator;
pub mod error;
pub mod executor;
pub mod schema;
pub mod store;
pub mod transfer;
pub mod types;

#[cfg(test)]
mod integration_tests;

// Re-exports for convenience
pub use compensator::{ReconciliationConfig, ReconciliationWorker, SagaCompensator};
pub use error::WalletError;
pub use executor::LedgerExecutor;
pub use schema::init_schema;
pub use store::{LedgerStore, order_wallet_ids};
pub use transfer::{TransferRecord, TransferStatus};
pub use types::{
    EventPayload, EventType, TransferCommandResult, Wallet, WalletCommandResult, WalletEvent,
};

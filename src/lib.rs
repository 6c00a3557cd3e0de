//! wallet-ledger - Wallet Ledger Transaction Engine
//!
//! Records monetary balances and mutates them through deposit, withdrawal and
//! transfer commands with four guarantees: balances never go negative, a
//! client command executes at most once under retries, every balance mutation
//! commits atomically with a durably-delivered domain event, and a transfer
//! that fails partway is compensated so no money is created or destroyed.
//!
//! # Modules
//!
//! - [`money`] - fixed 4-decimal-place amount normalization
//! - [`wallet`] - ledger store, transaction executor, saga compensator
//! - [`idempotency`] - request-deduplication gate and key cleanup
//! - [`outbox`] - transactional outbox, publisher seam, background relay
//! - [`consumer`] - exactly-once analytics projection
//! - [`config`] / [`logging`] / [`db`] - service plumbing

pub mod config;
pub mod consumer;
pub mod db;
pub mod idempotency;
pub mod logging;
pub mod money;
pub mod outbox;
pub mod wallet;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use consumer::{ConsumerConfig, InboundEvent, WalletEventsConsumer};
pub use db::Database;
pub use idempotency::{IdempotencyGate, IdempotencyStatus};
pub use outbox::{EventPublisher, OutboxRelay, RelayConfig};
pub use wallet::{
    LedgerExecutor, SagaCompensator, TransferStatus, WalletError, WalletEvent,
};

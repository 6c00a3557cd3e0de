//! walletd - Wallet Ledger Service
//!
//! Wires the ledger engine to its background workers:
//!
//! ```text
//! ┌──────────┐    ┌───────────────┐    ┌──────────────┐
//! │  Config  │───▶│  PostgreSQL   │───▶│  Workers     │
//! │  (YAML)  │    │  (schema init)│    │  relay       │
//! └──────────┘    └───────────────┘    │  reconcile   │
//!                                      │  key cleanup │
//!                                      └──────────────┘
//! ```
//!
//! Command execution itself (deposit/withdraw/transfer) is library surface;
//! the serving layer in front of it is out of scope here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use wallet_ledger::config::AppConfig;
use wallet_ledger::db::Database;
use wallet_ledger::idempotency::{CleanupConfig, IdempotencyCleanupWorker};
use wallet_ledger::logging::init_logging;
use wallet_ledger::outbox::publisher::LogPublisher;
use wallet_ledger::outbox::{OutboxRelay, RelayConfig};
use wallet_ledger::wallet::compensator::{
    ReconciliationConfig, ReconciliationWorker, SagaCompensator,
};
use wallet_ledger::wallet::schema;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--env" && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    std::env::var("WALLETD_ENV").unwrap_or_else(|_| "default".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _guard = init_logging(&config);

    info!(env = %env, git = env!("GIT_HASH"), "Starting walletd");

    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .context("Failed to connect to PostgreSQL")?,
    );
    schema::init_schema(db.pool())
        .await
        .context("Failed to initialize ledger schema")?;

    let mut workers = Vec::new();

    if config.outbox.enabled {
        let relay = OutboxRelay::new(
            db.pool().clone(),
            Arc::new(LogPublisher),
            RelayConfig {
                interval: Duration::from_millis(config.outbox.interval_ms),
                batch_size: config.outbox.batch_size,
                max_attempts: config.outbox.max_attempts,
                base_backoff: Duration::from_millis(config.outbox.base_backoff_ms),
                max_backoff: Duration::from_millis(config.outbox.max_backoff_ms),
            },
        );
        workers.push(tokio::spawn(async move { relay.run().await }));
    } else {
        tracing::warn!("Outbox relay disabled via config");
    }

    if config.reconciliation.enabled {
        let compensator = Arc::new(SagaCompensator::new(db.clone()));
        let reconciler = ReconciliationWorker::new(
            compensator,
            db.clone(),
            ReconciliationConfig {
                scan_interval: Duration::from_secs(config.reconciliation.scan_interval_secs),
                stale_threshold: Duration::from_secs(
                    config.reconciliation.debited_stale_secs.max(0) as u64,
                ),
                batch_size: config.reconciliation.batch_size,
            },
        );
        workers.push(tokio::spawn(async move { reconciler.run().await }));
    }

    let cleanup = IdempotencyCleanupWorker::new(
        db.pool().clone(),
        CleanupConfig {
            ttl: Duration::from_secs(config.idempotency.ttl_hours.max(0) as u64 * 3600),
            interval: Duration::from_secs(config.idempotency.cleanup_interval_secs),
        },
    );
    workers.push(tokio::spawn(async move { cleanup.run().await }));

    info!(workers = workers.len(), "walletd running");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, stopping walletd");

    Ok(())
}

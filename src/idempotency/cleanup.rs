//! Idempotency Key Cleanup
//!
//! Keys outlive their retention window only as garbage; this worker deletes
//! them on a fixed interval so the table stays bounded.

use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info};

use super::IdempotencyError;

/// Configuration for the cleanup worker
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Retention window for finished keys
    pub ttl: Duration,
    /// How often to run the delete pass
    pub interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(48 * 3600),
            interval: Duration::from_secs(3600),
        }
    }
}

/// Background worker deleting expired idempotency keys
pub struct IdempotencyCleanupWorker {
    pool: PgPool,
    config: CleanupConfig,
}

impl IdempotencyCleanupWorker {
    pub fn new(pool: PgPool, config: CleanupConfig) -> Self {
        Self { pool, config }
    }

    /// Run the cleanup loop forever.
    pub async fn run(&self) -> ! {
        info!(
            ttl_secs = self.config.ttl.as_secs(),
            interval_secs = self.config.interval.as_secs(),
            "Starting idempotency cleanup worker"
        );

        loop {
            if let Err(e) = self.cleanup_expired().await {
                error!(error = %e, "Idempotency cleanup failed");
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// Delete keys not updated within the retention window.
    pub async fn cleanup_expired(&self) -> Result<u64, IdempotencyError> {
        let result = sqlx::query(
            r#"DELETE FROM idempotency_keys
               WHERE updated_at < now() - INTERVAL '1 second' * $1"#,
        )
        .bind(self.config.ttl.as_secs() as i64)
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!(count = deleted, "Cleaned expired idempotency keys");
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_config_default() {
        let config = CleanupConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(172_800));
        assert_eq!(config.interval, Duration::from_secs(3_600));
    }
}

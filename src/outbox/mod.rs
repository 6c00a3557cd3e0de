//! Transactional Outbox
//!
//! Outbox rows are written in the same transaction as the ledger mutation
//! that produced them (see `wallet::store`); this module owns everything that
//! happens after commit: the message type, retry backoff, the publisher seam
//! and the background relay.
//!
//! Delivery semantics are at-least-once by design - a crash between publish
//! and the `published` mark means one redelivery, which downstream consumers
//! deduplicate.

pub mod publisher;
pub mod relay;

pub use publisher::{EventPublisher, PublishError};
pub use relay::{OutboxRelay, RelayConfig};

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Outbox row lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Published,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Published => "published",
            OutboxStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OutboxStatus::Pending),
            "published" => Some(OutboxStatus::Published),
            "failed" => Some(OutboxStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A not-yet-published (or audit-retained) domain event
#[derive(Debug, Clone)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboxMessage {
    /// Read one outbox row (audit/testing; the relay claims rows in batches).
    pub async fn get(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        use sqlx::Row;

        let row = sqlx::query(
            r#"SELECT id, event_type, payload, status, attempts, next_attempt_at,
                      published_at, last_error, created_at, updated_at
               FROM outbox_messages WHERE id = $1"#,
        )
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id_str: String = row.get("id");
        let status_str: String = row.get("status");
        Ok(Some(OutboxMessage {
            id: id_str.parse().map_err(|_| sqlx::Error::Decode(
                format!("invalid outbox id: {}", id_str).into(),
            ))?,
            event_type: row.get("event_type"),
            payload: row.get("payload"),
            status: OutboxStatus::from_str(&status_str).ok_or_else(|| {
                sqlx::Error::Decode(format!("unknown outbox status: {}", status_str).into())
            })?,
            attempts: row.get("attempts"),
            next_attempt_at: row.get("next_attempt_at"),
            published_at: row.get("published_at"),
            last_error: row.get("last_error"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }
}

/// Exponential backoff for publish retries: base delay doubled per attempt,
/// capped. `attempts` is the number of attempts already made (>= 1).
pub fn backoff_delay(attempts: i32, base: Duration, cap: Duration) -> Duration {
    // Shift clamped well past any realistic cap; avoids overflow
    let exponent = attempts.saturating_sub(1).clamp(0, 16) as u32;
    let delay = base.saturating_mul(1u32 << exponent);
    delay.min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_millis(1_000);
        let cap = Duration::from_millis(30_000);

        assert_eq!(backoff_delay(1, base, cap), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(2, base, cap), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(3, base, cap), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(4, base, cap), Duration::from_millis(8_000));
    }

    #[test]
    fn backoff_caps_at_maximum() {
        let base = Duration::from_millis(1_000);
        let cap = Duration::from_millis(30_000);

        assert_eq!(backoff_delay(6, base, cap), Duration::from_millis(30_000));
        assert_eq!(backoff_delay(10, base, cap), cap);
        assert_eq!(backoff_delay(100, base, cap), cap);
    }

    #[test]
    fn backoff_treats_zero_attempts_as_first() {
        let base = Duration::from_millis(1_000);
        let cap = Duration::from_millis(30_000);
        assert_eq!(backoff_delay(0, base, cap), base);
    }

    #[test]
    fn status_roundtrip() {
        for status in [
            OutboxStatus::Pending,
            OutboxStatus::Published,
            OutboxStatus::Failed,
        ] {
            assert_eq!(OutboxStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(OutboxStatus::from_str("bogus"), None);
    }
}

//! Ledger Store
//!
//! Transaction-scoped persistence primitives for wallets, events, transfers
//! and outbox rows. Helpers that mutate state take `&mut PgConnection` so the
//! caller decides the transaction boundary; the outbox enqueue runs on the
//! same connection as the balance mutation, which is what makes
//! "balance changed" and "event will be published" a single atomic fact.
//!
//! Locking: `SELECT ... FOR UPDATE` per wallet row. Callers that touch two
//! wallets must acquire the locks in [`order_wallet_ids`] order.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use super::error::WalletError;
use super::transfer::{TransferRecord, TransferStatus};
use super::types::{EventType, Wallet, WalletEvent};

/// Fixed total order for wallet lock acquisition.
///
/// Both transfer directions between the same pair lock in the same order,
/// which is the sole deadlock-avoidance mechanism of the ledger.
pub fn order_wallet_ids<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Ledger persistence operations
pub struct LedgerStore;

impl LedgerStore {
    /// Lock a wallet row for the duration of the surrounding transaction,
    /// creating it with a zero balance if it does not exist.
    ///
    /// Creation is insert-if-missing: a concurrent creator wins the insert
    /// and this call falls through to locking the existing row.
    pub async fn lock_or_create_wallet(
        conn: &mut PgConnection,
        wallet_id: &str,
    ) -> Result<Wallet, WalletError> {
        if let Some(row) = sqlx::query(
            r#"SELECT id, balance, version, created_at, updated_at
               FROM wallets WHERE id = $1 FOR UPDATE"#,
        )
        .bind(wallet_id)
        .fetch_optional(&mut *conn)
        .await?
        {
            return row_to_wallet(&row);
        }

        sqlx::query("INSERT INTO wallets (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(wallet_id)
            .execute(&mut *conn)
            .await?;

        let row = sqlx::query(
            r#"SELECT id, balance, version, created_at, updated_at
               FROM wallets WHERE id = $1 FOR UPDATE"#,
        )
        .bind(wallet_id)
        .fetch_one(&mut *conn)
        .await?;

        row_to_wallet(&row)
    }

    /// Write a new balance, bumping the version counter.
    ///
    /// Only called while holding the row lock from [`Self::lock_or_create_wallet`].
    pub async fn save_balance(
        conn: &mut PgConnection,
        wallet_id: &str,
        balance: Decimal,
    ) -> Result<(), WalletError> {
        sqlx::query(
            r#"UPDATE wallets
               SET balance = $1, version = version + 1, updated_at = now()
               WHERE id = $2"#,
        )
        .bind(balance)
        .bind(wallet_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Append an immutable domain event.
    pub async fn append_event(
        conn: &mut PgConnection,
        event: &WalletEvent,
    ) -> Result<(), WalletError> {
        sqlx::query(
            r#"INSERT INTO wallet_events (id, wallet_id, event_type, amount, metadata, request_id, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(event.id.to_string())
        .bind(&event.wallet_id)
        .bind(event.event_type.as_str())
        .bind(event.amount)
        .bind(&event.metadata)
        .bind(&event.request_id)
        .bind(event.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Enqueue an outbox row on the same connection (same transaction) as the
    /// mutation that produced the event.
    pub async fn enqueue_outbox(
        conn: &mut PgConnection,
        event_type: &str,
        payload: &Value,
    ) -> Result<Uuid, WalletError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO outbox_messages (id, event_type, payload, status, attempts)
               VALUES ($1, $2, $3, 'pending', 0)"#,
        )
        .bind(id.to_string())
        .bind(event_type)
        .bind(payload)
        .execute(&mut *conn)
        .await?;

        Ok(id)
    }

    /// Record a new transfer row.
    pub async fn insert_transfer(
        conn: &mut PgConnection,
        record: &TransferRecord,
    ) -> Result<(), WalletError> {
        sqlx::query(
            r#"INSERT INTO transfers
                   (id, from_wallet_id, to_wallet_id, amount, status, request_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(record.id.to_string())
        .bind(&record.from_wallet_id)
        .bind(&record.to_wallet_id)
        .bind(record.amount)
        .bind(record.status.as_str())
        .bind(&record.request_id)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Advance a transfer's status, optionally recording a failure reason.
    pub async fn update_transfer_status(
        conn: &mut PgConnection,
        transfer_id: Uuid,
        status: TransferStatus,
        failure_reason: Option<&str>,
    ) -> Result<(), WalletError> {
        sqlx::query(
            r#"UPDATE transfers
               SET status = $1, failure_reason = COALESCE($2, failure_reason), updated_at = now()
               WHERE id = $3"#,
        )
        .bind(status.as_str())
        .bind(failure_reason)
        .bind(transfer_id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Find and lock the most recent transfer matching the given fields and
    /// status. The compensator uses this to locate `debited` rows.
    pub async fn find_transfer_for_update(
        conn: &mut PgConnection,
        from_wallet_id: &str,
        to_wallet_id: &str,
        amount: Decimal,
        status: TransferStatus,
    ) -> Result<Option<TransferRecord>, WalletError> {
        let row = sqlx::query(
            r#"SELECT id, from_wallet_id, to_wallet_id, amount, status, request_id,
                      failure_reason, created_at, updated_at
               FROM transfers
               WHERE from_wallet_id = $1 AND to_wallet_id = $2 AND amount = $3 AND status = $4
               ORDER BY created_at DESC
               LIMIT 1
               FOR UPDATE"#,
        )
        .bind(from_wallet_id)
        .bind(to_wallet_id)
        .bind(amount)
        .bind(status.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(|r| row_to_transfer(&r)).transpose()
    }

    /// Transfers stuck in `debited` longer than `older_than_secs`.
    ///
    /// Input to the reconciliation sweep; ordered oldest first.
    pub async fn find_stale_debited(
        pool: &PgPool,
        older_than_secs: i64,
        limit: i64,
    ) -> Result<Vec<TransferRecord>, WalletError> {
        let rows = sqlx::query(
            r#"SELECT id, from_wallet_id, to_wallet_id, amount, status, request_id,
                      failure_reason, created_at, updated_at
               FROM transfers
               WHERE status = 'debited'
                 AND updated_at < now() - INTERVAL '1 second' * $1
               ORDER BY updated_at ASC
               LIMIT $2"#,
        )
        .bind(older_than_secs)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.iter().map(row_to_transfer).collect()
    }

    /// Read a wallet without locking. Missing wallet is not an error.
    pub async fn get_wallet(pool: &PgPool, wallet_id: &str) -> Result<Option<Wallet>, WalletError> {
        let row = sqlx::query(
            r#"SELECT id, balance, version, created_at, updated_at
               FROM wallets WHERE id = $1"#,
        )
        .bind(wallet_id)
        .fetch_optional(pool)
        .await?;

        row.map(|r| row_to_wallet(&r)).transpose()
    }

    /// Event history for a wallet, newest first.
    pub async fn get_events(
        pool: &PgPool,
        wallet_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<WalletEvent>, WalletError> {
        let rows = sqlx::query(
            r#"SELECT id, wallet_id, event_type, amount, metadata, request_id, created_at
               FROM wallet_events
               WHERE wallet_id = $1
               ORDER BY created_at DESC
               OFFSET $2 LIMIT $3"#,
        )
        .bind(wallet_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }

    /// Read a transfer by id.
    pub async fn get_transfer(
        pool: &PgPool,
        transfer_id: Uuid,
    ) -> Result<Option<TransferRecord>, WalletError> {
        let row = sqlx::query(
            r#"SELECT id, from_wallet_id, to_wallet_id, amount, status, request_id,
                      failure_reason, created_at, updated_at
               FROM transfers WHERE id = $1"#,
        )
        .bind(transfer_id.to_string())
        .fetch_optional(pool)
        .await?;

        row.map(|r| row_to_transfer(&r)).transpose()
    }
}

fn row_to_wallet(row: &PgRow) -> Result<Wallet, WalletError> {
    Ok(Wallet {
        id: row.get("id"),
        balance: row.get("balance"),
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_event(row: &PgRow) -> Result<WalletEvent, WalletError> {
    let id_str: String = row.get("id");
    let id: Uuid = id_str
        .parse()
        .map_err(|_| WalletError::Store(format!("Invalid event id: {}", id_str)))?;

    let type_str: String = row.get("event_type");
    let event_type = EventType::from_str(&type_str)
        .ok_or_else(|| WalletError::Store(format!("Unknown event type: {}", type_str)))?;

    Ok(WalletEvent {
        id,
        wallet_id: row.get("wallet_id"),
        event_type,
        amount: row.get("amount"),
        metadata: row.get("metadata"),
        request_id: row.get("request_id"),
        created_at: row.get("created_at"),
    })
}

fn row_to_transfer(row: &PgRow) -> Result<TransferRecord, WalletError> {
    let id_str: String = row.get("id");
    let id: Uuid = id_str
        .parse()
        .map_err(|_| WalletError::Store(format!("Invalid transfer id: {}", id_str)))?;

    let status_str: String = row.get("status");
    let status = TransferStatus::from_str(&status_str)
        .ok_or_else(|| WalletError::Store(format!("Unknown transfer status: {}", status_str)))?;

    Ok(TransferRecord {
        id,
        from_wallet_id: row.get("from_wallet_id"),
        to_wallet_id: row.get("to_wallet_id"),
        amount: row.get("amount"),
        status,
        request_id: row.get("request_id"),
        failure_reason: row.get("failure_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_order_is_direction_independent() {
        assert_eq!(order_wallet_ids("alice", "bob"), ("alice", "bob"));
        assert_eq!(order_wallet_ids("bob", "alice"), ("alice", "bob"));
        assert_eq!(order_wallet_ids("x", "x"), ("x", "x"));
    }
}

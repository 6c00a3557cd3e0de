//! Ledger schema bootstrap
//!
//! DDL lives next to the store so tests and fresh deployments can stand up
//! the full schema with one call. Every monetary column is NUMERIC(20, 4).

use sqlx::PgPool;

const CREATE_WALLETS: &str = r#"
CREATE TABLE IF NOT EXISTS wallets (
    id          VARCHAR(128) PRIMARY KEY,
    balance     NUMERIC(20, 4) NOT NULL DEFAULT 0 CHECK (balance >= 0),
    version     BIGINT NOT NULL DEFAULT 1,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_WALLET_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS wallet_events (
    id          VARCHAR(36) PRIMARY KEY,
    wallet_id   VARCHAR(128) NOT NULL,
    event_type  VARCHAR(64) NOT NULL,
    amount      NUMERIC(20, 4) NOT NULL,
    metadata    JSONB,
    request_id  VARCHAR(128),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_TRANSFERS: &str = r#"
CREATE TABLE IF NOT EXISTS transfers (
    id              VARCHAR(36) PRIMARY KEY,
    from_wallet_id  VARCHAR(128) NOT NULL,
    to_wallet_id    VARCHAR(128) NOT NULL,
    amount          NUMERIC(20, 4) NOT NULL CHECK (amount > 0),
    status          VARCHAR(16) NOT NULL DEFAULT 'initiated',
    request_id      VARCHAR(128),
    failure_reason  TEXT,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_IDEMPOTENCY_KEYS: &str = r#"
CREATE TABLE IF NOT EXISTS idempotency_keys (
    id              VARCHAR(128) PRIMARY KEY,
    request_hash    VARCHAR(64),
    status          VARCHAR(16) NOT NULL DEFAULT 'processing',
    response_status INTEGER,
    response_body   JSONB,
    locked_at       TIMESTAMPTZ,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_OUTBOX_MESSAGES: &str = r#"
CREATE TABLE IF NOT EXISTS outbox_messages (
    id              VARCHAR(36) PRIMARY KEY,
    event_type      VARCHAR(64) NOT NULL,
    payload         JSONB NOT NULL,
    status          VARCHAR(16) NOT NULL DEFAULT 'pending',
    attempts        INTEGER NOT NULL DEFAULT 0,
    next_attempt_at TIMESTAMPTZ,
    published_at    TIMESTAMPTZ,
    last_error      TEXT,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_CONSUMED_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS consumed_events (
    event_id     VARCHAR(64) PRIMARY KEY,
    event_type   VARCHAR(64) NOT NULL,
    processed_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_WALLET_ANALYTICS: &str = r#"
CREATE TABLE IF NOT EXISTS wallet_analytics (
    wallet_id          VARCHAR(128) PRIMARY KEY,
    total_deposited    NUMERIC(20, 4) NOT NULL DEFAULT 0 CHECK (total_deposited >= 0),
    total_withdrawn    NUMERIC(20, 4) NOT NULL DEFAULT 0 CHECK (total_withdrawn >= 0),
    deposits_count     INTEGER NOT NULL DEFAULT 0,
    withdrawals_count  INTEGER NOT NULL DEFAULT 0,
    flagged_for_review BOOLEAN NOT NULL DEFAULT FALSE,
    created_at         TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at         TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_wallet_events_wallet ON wallet_events (wallet_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_wallet_events_request ON wallet_events (request_id)",
    "CREATE INDEX IF NOT EXISTS idx_transfers_from_to ON transfers (from_wallet_id, to_wallet_id)",
    "CREATE INDEX IF NOT EXISTS idx_transfers_status ON transfers (status, updated_at)",
    "CREATE INDEX IF NOT EXISTS idx_idempotency_updated ON idempotency_keys (updated_at)",
    "CREATE INDEX IF NOT EXISTS idx_outbox_status_created ON outbox_messages (status, created_at)",
];

/// Create all ledger tables and indexes if they do not exist.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Initializing ledger schema");

    for ddl in [
        CREATE_WALLETS,
        CREATE_WALLET_EVENTS,
        CREATE_TRANSFERS,
        CREATE_IDEMPOTENCY_KEYS,
        CREATE_OUTBOX_MESSAGES,
        CREATE_CONSUMED_EVENTS,
        CREATE_WALLET_ANALYTICS,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    for ddl in CREATE_INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("Ledger schema initialized");
    Ok(())
}

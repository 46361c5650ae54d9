//! PostgreSQL schema bootstrap.

use sqlx::PgPool;

/// Create the ledger tables if they do not exist. Idempotent; safe to run at
/// every startup.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wallets_tb (
            id                   BIGSERIAL PRIMARY KEY,
            user_id              BIGINT NOT NULL UNIQUE,
            address              TEXT NOT NULL UNIQUE,
            balance              NUMERIC(20,2) NOT NULL DEFAULT 0 CHECK (balance >= 0),
            active               BOOLEAN NOT NULL DEFAULT TRUE,
            daily_transfer_limit NUMERIC(20,2) NOT NULL,
            created_at           TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at           TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ledger_entries_tb (
            id            BIGSERIAL PRIMARY KEY,
            account_id    BIGINT NOT NULL REFERENCES wallets_tb(id),
            kind          SMALLINT NOT NULL,
            amount        NUMERIC(20,2) NOT NULL CHECK (amount > 0),
            balance_after NUMERIC(20,2) NOT NULL,
            counterparty  BIGINT,
            description   TEXT,
            reference_id  TEXT,
            status        SMALLINT NOT NULL,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The idempotency guard: at most one entry per (reference, kind).
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS ledger_entries_reference_kind_uidx
        ON ledger_entries_tb (reference_id, kind)
        WHERE reference_id IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS ledger_entries_account_idx
        ON ledger_entries_tb (account_id, id DESC)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transfer_otps_tb (
            id                TEXT PRIMARY KEY,
            user_id           BIGINT NOT NULL,
            code              TEXT NOT NULL,
            recipient_address TEXT NOT NULL,
            amount            NUMERIC(20,2) NOT NULL,
            purpose           TEXT,
            attempts          SMALLINT NOT NULL DEFAULT 0,
            expires_at        TIMESTAMPTZ NOT NULL,
            used_at           TIMESTAMPTZ,
            created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pending_transfers_tb (
            id                TEXT PRIMARY KEY,
            sender_account    BIGINT NOT NULL REFERENCES wallets_tb(id),
            sender_user       BIGINT NOT NULL,
            recipient_account BIGINT NOT NULL REFERENCES wallets_tb(id),
            recipient_user    BIGINT NOT NULL,
            amount            NUMERIC(20,2) NOT NULL,
            purpose           TEXT,
            state             SMALLINT NOT NULL DEFAULT 0,
            created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            expires_at        TIMESTAMPTZ NOT NULL,
            accepted_at       TIMESTAMPTZ,
            cancelled_at      TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS pending_transfers_recipient_idx
        ON pending_transfers_tb (recipient_user, created_at DESC)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS pending_transfers_sender_idx
        ON pending_transfers_tb (sender_user, created_at DESC)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log_tb (
            id         BIGSERIAL PRIMARY KEY,
            actor_user BIGINT NOT NULL,
            action     TEXT NOT NULL,
            target     TEXT NOT NULL,
            detail     JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

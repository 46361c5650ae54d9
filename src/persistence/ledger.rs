//! PostgreSQL Ledger Store.
//!
//! `FOR UPDATE` row locks give the atomic check-and-mutate unit; two-account
//! operations lock the lower wallet id first. The partial unique index on
//! `(reference_id, kind)` backs idempotent retries.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::{debug, info};

use crate::core_types::{AccountId, UserId};
use crate::ledger::{
    Account, EntryKind, EntryStatus, LedgerEntry, LedgerError, LedgerStore, TransferExecution,
    TransferReceipt, generate_address,
};

use super::PgStore;

fn row_to_account(row: &PgRow) -> Account {
    Account {
        id: row.get::<i64, _>("id") as AccountId,
        user_id: row.get::<i64, _>("user_id") as UserId,
        address: row.get("address"),
        balance: row.get("balance"),
        active: row.get("active"),
        daily_transfer_limit: row.get("daily_transfer_limit"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_entry(row: &PgRow) -> Result<LedgerEntry, LedgerError> {
    let kind_id: i16 = row.get("kind");
    let status_id: i16 = row.get("status");
    Ok(LedgerEntry {
        id: row.get::<i64, _>("id") as u64,
        account_id: row.get::<i64, _>("account_id") as AccountId,
        kind: EntryKind::from_id(kind_id)
            .ok_or_else(|| LedgerError::StoreError(format!("bad entry kind {}", kind_id)))?,
        amount: row.get("amount"),
        balance_after: row.get("balance_after"),
        counterparty: row
            .get::<Option<i64>, _>("counterparty")
            .map(|c| c as AccountId),
        description: row.get("description"),
        reference_id: row.get("reference_id"),
        status: EntryStatus::from_id(status_id)
            .ok_or_else(|| LedgerError::StoreError(format!("bad entry status {}", status_id)))?,
        created_at: row.get("created_at"),
    })
}

const SELECT_ACCOUNT: &str = "SELECT id, user_id, address, balance, active, \
     daily_transfer_limit, created_at, updated_at FROM wallets_tb";

impl PgStore {
    /// Look up a committed transfer receipt by reference id.
    async fn receipt_for(
        &self,
        reference_id: &str,
    ) -> Result<Option<TransferReceipt>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT o.balance_after AS sender_after, i.balance_after AS recipient_after
            FROM ledger_entries_tb o
            JOIN ledger_entries_tb i
              ON i.reference_id = o.reference_id AND i.kind = $1
            WHERE o.reference_id = $2 AND o.kind = $3
            "#,
        )
        .bind(EntryKind::TransferIn.id())
        .bind(reference_id)
        .bind(EntryKind::TransferOut.id())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| TransferReceipt {
            reference_id: reference_id.to_string(),
            sender_balance_after: row.get("sender_after"),
            recipient_balance_after: row.get("recipient_after"),
        }))
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn open_account(
        &self,
        user_id: UserId,
        daily_transfer_limit: Decimal,
        welcome_bonus: Decimal,
    ) -> Result<Account, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let address = generate_address();
        let inserted = sqlx::query(
            "INSERT INTO wallets_tb (user_id, address, balance, daily_transfer_limit) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, address, balance, active, daily_transfer_limit, \
             created_at, updated_at",
        )
        .bind(user_id as i64)
        .bind(&address)
        .bind(welcome_bonus.max(Decimal::ZERO))
        .bind(daily_transfer_limit)
        .fetch_one(&mut *tx)
        .await;

        let account = match inserted {
            Ok(row) => row_to_account(&row),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(LedgerError::WalletExists);
            }
            Err(e) => return Err(e.into()),
        };

        if welcome_bonus > Decimal::ZERO {
            sqlx::query(
                "INSERT INTO ledger_entries_tb \
                 (account_id, kind, amount, balance_after, description, reference_id, status) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(account.id as i64)
            .bind(EntryKind::Earning.id())
            .bind(welcome_bonus)
            .bind(welcome_bonus)
            .bind("[WELCOME] Signup bonus")
            .bind(format!("welcome_{}", account.id))
            .bind(EntryStatus::Completed.id())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(account_id = account.id, user_id, "Wallet opened");
        Ok(account)
    }

    async fn account(&self, id: AccountId) -> Result<Account, LedgerError> {
        sqlx::query(&format!("{} WHERE id = $1", SELECT_ACCOUNT))
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_account(&row))
            .ok_or(LedgerError::AccountNotFound(id))
    }

    async fn account_by_user(&self, user_id: UserId) -> Result<Account, LedgerError> {
        sqlx::query(&format!("{} WHERE user_id = $1", SELECT_ACCOUNT))
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_account(&row))
            .ok_or(LedgerError::WalletNotFound)
    }

    async fn account_by_address(&self, address: &str) -> Result<Account, LedgerError> {
        sqlx::query(&format!("{} WHERE address = $1", SELECT_ACCOUNT))
            .bind(address)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_account(&row))
            .ok_or_else(|| LedgerError::AddressNotFound(address.to_string()))
    }

    async fn execute_transfer(
        &self,
        exec: &TransferExecution,
    ) -> Result<TransferReceipt, LedgerError> {
        if exec.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if exec.sender == exec.recipient {
            return Err(LedgerError::SameAccount);
        }

        // Fast path: a prior commit with this reference id.
        if let Some(receipt) = self.receipt_for(&exec.reference_id).await? {
            debug!(reference_id = %exec.reference_id, "Duplicate reference, returning recorded receipt");
            return Ok(receipt);
        }

        let mut tx = self.pool.begin().await?;

        // Lock both wallet rows, lower id first.
        let (first, second) = if exec.sender < exec.recipient {
            (exec.sender, exec.recipient)
        } else {
            (exec.recipient, exec.sender)
        };
        let mut locked = Vec::with_capacity(2);
        for id in [first, second] {
            let row = sqlx::query("SELECT id, balance, active FROM wallets_tb WHERE id = $1 FOR UPDATE")
                .bind(id as i64)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(LedgerError::AccountNotFound(id))?;
            locked.push((
                row.get::<i64, _>("id") as AccountId,
                row.get::<Decimal, _>("balance"),
                row.get::<bool, _>("active"),
            ));
        }
        for (id, _, active) in &locked {
            if !active {
                return Err(LedgerError::AccountFrozen(*id));
            }
        }
        let sender_balance = locked
            .iter()
            .find(|(id, _, _)| *id == exec.sender)
            .map(|(_, balance, _)| *balance)
            .ok_or(LedgerError::AccountNotFound(exec.sender))?;
        if sender_balance < exec.amount {
            return Err(LedgerError::InsufficientFunds);
        }

        let sender_after: Decimal = sqlx::query_scalar(
            "UPDATE wallets_tb SET balance = balance - $1, updated_at = NOW() \
             WHERE id = $2 RETURNING balance",
        )
        .bind(exec.amount)
        .bind(exec.sender as i64)
        .fetch_one(&mut *tx)
        .await?;

        let recipient_after: Decimal = sqlx::query_scalar(
            "UPDATE wallets_tb SET balance = balance + $1, updated_at = NOW() \
             WHERE id = $2 RETURNING balance",
        )
        .bind(exec.amount)
        .bind(exec.recipient as i64)
        .fetch_one(&mut *tx)
        .await?;

        let legs = [
            (exec.sender, EntryKind::TransferOut, sender_after, exec.recipient),
            (exec.recipient, EntryKind::TransferIn, recipient_after, exec.sender),
        ];
        for (account, kind, balance_after, counterparty) in legs {
            let inserted = sqlx::query(
                "INSERT INTO ledger_entries_tb \
                 (account_id, kind, amount, balance_after, counterparty, description, reference_id, status) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(account as i64)
            .bind(kind.id())
            .bind(exec.amount)
            .bind(balance_after)
            .bind(counterparty as i64)
            .bind(&exec.description)
            .bind(&exec.reference_id)
            .bind(EntryStatus::Completed.id())
            .execute(&mut *tx)
            .await;

            match inserted {
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    // A concurrent duplicate won the race; our transaction is
                    // dead, their receipt is the answer.
                    drop(tx);
                    return self.receipt_for(&exec.reference_id).await?.ok_or_else(|| {
                        LedgerError::StoreError("duplicate reference without receipt".to_string())
                    });
                }
                Err(e) => return Err(e.into()),
                Ok(_) => {}
            }
        }

        tx.commit().await?;

        info!(
            reference_id = %exec.reference_id,
            sender = exec.sender,
            recipient = exec.recipient,
            amount = %exec.amount,
            "Transfer committed"
        );
        Ok(TransferReceipt {
            reference_id: exec.reference_id.clone(),
            sender_balance_after: sender_after,
            recipient_balance_after: recipient_after,
        })
    }

    async fn receipt(&self, reference_id: &str) -> Result<Option<TransferReceipt>, LedgerError> {
        self.receipt_for(reference_id).await
    }

    async fn adjust(
        &self,
        account_id: AccountId,
        kind: EntryKind,
        amount: Decimal,
        description: &str,
    ) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let mut tx = self.pool.begin().await?;

        let balance: Decimal =
            sqlx::query_scalar("SELECT balance FROM wallets_tb WHERE id = $1 FOR UPDATE")
                .bind(account_id as i64)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(LedgerError::AccountNotFound(account_id))?;

        if !kind.is_credit() && balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        let delta = if kind.is_credit() { amount } else { -amount };

        let new_balance: Decimal = sqlx::query_scalar(
            "UPDATE wallets_tb SET balance = balance + $1, updated_at = NOW() \
             WHERE id = $2 RETURNING balance",
        )
        .bind(delta)
        .bind(account_id as i64)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO ledger_entries_tb \
             (account_id, kind, amount, balance_after, description, status) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(account_id as i64)
        .bind(kind.id())
        .bind(amount)
        .bind(new_balance)
        .bind(description)
        .bind(EntryStatus::Completed.id())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(new_balance)
    }

    async fn set_active(&self, account_id: AccountId, active: bool) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE wallets_tb SET active = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(active)
        .bind(account_id as i64)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        info!(account_id, active, "Account active flag changed");
        Ok(())
    }

    async fn set_daily_limit(
        &self,
        account_id: AccountId,
        limit: Decimal,
    ) -> Result<(), LedgerError> {
        if limit < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let result = sqlx::query(
            "UPDATE wallets_tb SET daily_transfer_limit = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(limit)
        .bind(account_id as i64)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        Ok(())
    }

    async fn entries(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        // Surface unknown accounts as NotFound, not an empty history.
        self.account(account_id).await?;

        let rows = sqlx::query(
            "SELECT id, account_id, kind, amount, balance_after, counterparty, \
             description, reference_id, status, created_at \
             FROM ledger_entries_tb WHERE account_id = $1 ORDER BY id DESC LIMIT $2",
        )
        .bind(account_id as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }
}

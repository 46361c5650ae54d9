//! PostgreSQL pending transfer store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::core_types::{AccountId, PendingTransferId, UserId};
use crate::flow::{FlowError, PendingState, PendingStore, PendingTransfer};

use super::PgStore;

const SELECT_PENDING: &str = "SELECT id, sender_account, sender_user, recipient_account, \
     recipient_user, amount, purpose, state, created_at, expires_at, accepted_at, \
     cancelled_at FROM pending_transfers_tb";

fn row_to_pending(row: &PgRow) -> Result<PendingTransfer, FlowError> {
    let id: String = row.get("id");
    let state: i16 = row.get("state");
    Ok(PendingTransfer {
        id: id
            .parse()
            .map_err(|_| FlowError::StoreError(format!("bad pending id {}", id)))?,
        sender_account: row.get::<i64, _>("sender_account") as AccountId,
        sender_user: row.get::<i64, _>("sender_user") as UserId,
        recipient_account: row.get::<i64, _>("recipient_account") as AccountId,
        recipient_user: row.get::<i64, _>("recipient_user") as UserId,
        amount: row.get("amount"),
        purpose: row.get("purpose"),
        state: PendingState::try_from(state)
            .map_err(|_| FlowError::StoreError(format!("bad pending state {}", state)))?,
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        accepted_at: row.get("accepted_at"),
        cancelled_at: row.get("cancelled_at"),
    })
}

#[async_trait]
impl PendingStore for PgStore {
    async fn create(&self, transfer: PendingTransfer) -> Result<(), FlowError> {
        sqlx::query(
            "INSERT INTO pending_transfers_tb \
             (id, sender_account, sender_user, recipient_account, recipient_user, \
              amount, purpose, state, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(transfer.id.to_string())
        .bind(transfer.sender_account as i64)
        .bind(transfer.sender_user as i64)
        .bind(transfer.recipient_account as i64)
        .bind(transfer.recipient_user as i64)
        .bind(transfer.amount)
        .bind(&transfer.purpose)
        .bind(transfer.state.id())
        .bind(transfer.created_at)
        .bind(transfer.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: PendingTransferId) -> Result<Option<PendingTransfer>, FlowError> {
        sqlx::query(&format!("{} WHERE id = $1", SELECT_PENDING))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_pending(&row))
            .transpose()
    }

    async fn transition_if(
        &self,
        id: PendingTransferId,
        expected: PendingState,
        next: PendingState,
        at: DateTime<Utc>,
    ) -> Result<bool, FlowError> {
        // One conditional UPDATE is the CAS; rows_affected tells us who won.
        let result = match next {
            PendingState::Accepted => {
                sqlx::query(
                    "UPDATE pending_transfers_tb SET state = $1, accepted_at = $2 \
                     WHERE id = $3 AND state = $4",
                )
                .bind(next.id())
                .bind(at)
                .bind(id.to_string())
                .bind(expected.id())
                .execute(&self.pool)
                .await?
            }
            PendingState::Cancelled => {
                sqlx::query(
                    "UPDATE pending_transfers_tb SET state = $1, cancelled_at = $2 \
                     WHERE id = $3 AND state = $4",
                )
                .bind(next.id())
                .bind(at)
                .bind(id.to_string())
                .bind(expected.id())
                .execute(&self.pool)
                .await?
            }
            _ => {
                sqlx::query(
                    "UPDATE pending_transfers_tb SET state = $1 \
                     WHERE id = $2 AND state = $3",
                )
                .bind(next.id())
                .bind(id.to_string())
                .bind(expected.id())
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }

    async fn list_incoming(&self, user: UserId) -> Result<Vec<PendingTransfer>, FlowError> {
        let rows = sqlx::query(&format!(
            "{} WHERE recipient_user = $1 ORDER BY created_at DESC",
            SELECT_PENDING
        ))
        .bind(user as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_pending).collect()
    }

    async fn list_outgoing(&self, user: UserId) -> Result<Vec<PendingTransfer>, FlowError> {
        let rows = sqlx::query(&format!(
            "{} WHERE sender_user = $1 ORDER BY created_at DESC",
            SELECT_PENDING
        ))
        .bind(user as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_pending).collect()
    }
}

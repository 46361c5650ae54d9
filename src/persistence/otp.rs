//! PostgreSQL OTP challenge store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use crate::core_types::{OtpId, UserId};
use crate::otp::{OtpChallenge, OtpError, OtpPayload, OtpStore};

use super::PgStore;

#[async_trait]
impl OtpStore for PgStore {
    async fn insert(&self, challenge: OtpChallenge) -> Result<(), OtpError> {
        sqlx::query(
            "INSERT INTO transfer_otps_tb \
             (id, user_id, code, recipient_address, amount, purpose, attempts, \
              expires_at, used_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(challenge.id.to_string())
        .bind(challenge.user_id as i64)
        .bind(&challenge.code)
        .bind(&challenge.recipient_address)
        .bind(challenge.amount)
        .bind(&challenge.purpose)
        .bind(challenge.attempts as i16)
        .bind(challenge.expires_at)
        .bind(challenge.used_at)
        .bind(challenge.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume(
        &self,
        id: OtpId,
        user_id: UserId,
        code: &str,
        now: DateTime<Utc>,
        max_attempts: u8,
    ) -> Result<OtpPayload, OtpError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent verify attempts on one challenge.
        let row = sqlx::query(
            "SELECT user_id, code, recipient_address, amount, purpose, attempts, \
             expires_at, used_at \
             FROM transfer_otps_tb WHERE id = $1 FOR UPDATE",
        )
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(OtpError::ChallengeNotFound)?;

        if row.get::<i64, _>("user_id") as UserId != user_id {
            return Err(OtpError::WrongOwner);
        }
        if row.get::<Option<DateTime<Utc>>, _>("used_at").is_some() {
            return Err(OtpError::AlreadyUsed);
        }
        if now >= row.get::<DateTime<Utc>, _>("expires_at") {
            return Err(OtpError::Expired);
        }
        let attempts = row.get::<i16, _>("attempts");
        if attempts >= max_attempts as i16 {
            return Err(OtpError::TooManyAttempts);
        }
        if row.get::<String, _>("code") != code {
            sqlx::query("UPDATE transfer_otps_tb SET attempts = attempts + 1 WHERE id = $1")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Err(OtpError::InvalidCode);
        }

        sqlx::query("UPDATE transfer_otps_tb SET used_at = $1 WHERE id = $2")
            .bind(now)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(OtpPayload {
            recipient_address: row.get("recipient_address"),
            amount: row.get::<Decimal, _>("amount"),
            purpose: row.get("purpose"),
        })
    }
}

//! OTP challenge storage seam.
//!
//! `consume` is the whole verification decision, placed in the store so each
//! backend can make it atomic per challenge row: the in-memory store holds
//! the row mutex across check-and-mutate, the PostgreSQL store holds a row
//! lock inside one transaction. Two parallel verify calls can therefore never
//! both read `attempts = 2` and both proceed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Mutex;

use crate::core_types::{OtpId, UserId};

use super::challenge::{OtpChallenge, OtpPayload};
use super::error::OtpError;

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert(&self, challenge: OtpChallenge) -> Result<(), OtpError>;

    /// Validate and consume a challenge atomically. Check order:
    /// exists and owned by `user_id` → not used → not expired → attempts
    /// below ceiling → code matches. A code mismatch increments the attempt
    /// counter; a match marks the challenge used exactly once and releases
    /// the bound transfer parameters.
    async fn consume(
        &self,
        id: OtpId,
        user_id: UserId,
        code: &str,
        now: DateTime<Utc>,
        max_attempts: u8,
    ) -> Result<OtpPayload, OtpError>;
}

/// In-memory challenge store.
#[derive(Default)]
pub struct MemoryOtpStore {
    challenges: DashMap<OtpId, Mutex<OtpChallenge>>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn insert(&self, challenge: OtpChallenge) -> Result<(), OtpError> {
        self.challenges.insert(challenge.id, Mutex::new(challenge));
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
        let entry = self.challenges.get(&id).ok_or(OtpError::ChallengeNotFound)?;
        let mut challenge = entry.lock().unwrap();

        if challenge.user_id != user_id {
            return Err(OtpError::WrongOwner);
        }
        if challenge.used_at.is_some() {
            return Err(OtpError::AlreadyUsed);
        }
        if now >= challenge.expires_at {
            return Err(OtpError::Expired);
        }
        if challenge.attempts >= max_attempts {
            return Err(OtpError::TooManyAttempts);
        }
        if challenge.code != code {
            challenge.attempts += 1;
            return Err(OtpError::InvalidCode);
        }

        challenge.used_at = Some(now);
        Ok(challenge.payload())
    }
}

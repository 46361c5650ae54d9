//! Pending transfer records and storage seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::core_types::{AccountId, PendingTransferId, UserId};

use super::error::FlowError;
use super::state::PendingState;

/// An OTP-verified transfer offer that has not yet touched the ledger.
///
/// Funds are NOT deducted while `state == Pending`: verifying identity does
/// not move money, it only creates a revocable offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub id: PendingTransferId,
    pub sender_account: AccountId,
    pub sender_user: UserId,
    pub recipient_account: AccountId,
    pub recipient_user: UserId,
    pub amount: Decimal,
    pub purpose: Option<String>,
    pub state: PendingState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl PendingTransfer {
    /// Ledger idempotency key for this offer's commit: a duplicate accept
    /// call re-uses it and lands on the recorded receipt.
    pub fn reference_id(&self) -> String {
        format!("transfer_{}", self.id)
    }

    /// Still `Pending` but past its expiry: due for the lazy transition.
    pub fn is_expiry_due(&self, now: DateTime<Utc>) -> bool {
        self.state == PendingState::Pending && now >= self.expires_at
    }
}

#[async_trait]
pub trait PendingStore: Send + Sync {
    async fn create(&self, transfer: PendingTransfer) -> Result<(), FlowError>;

    async fn get(&self, id: PendingTransferId) -> Result<Option<PendingTransfer>, FlowError>;

    /// Atomic CAS transition: moves the row from `expected` to `next` and
    /// stamps the matching timestamp. Returns false when the row was not in
    /// `expected` (someone else won the race).
    async fn transition_if(
        &self,
        id: PendingTransferId,
        expected: PendingState,
        next: PendingState,
        at: DateTime<Utc>,
    ) -> Result<bool, FlowError>;

    /// Offers addressed to `user`, newest first.
    async fn list_incoming(&self, user: UserId) -> Result<Vec<PendingTransfer>, FlowError>;

    /// Offers sent by `user`, newest first.
    async fn list_outgoing(&self, user: UserId) -> Result<Vec<PendingTransfer>, FlowError>;
}

/// In-memory pending store.
#[derive(Default)]
pub struct MemoryPendingStore {
    transfers: DashMap<PendingTransferId, Mutex<PendingTransfer>>,
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn list_matching<F>(&self, predicate: F) -> Vec<PendingTransfer>
    where
        F: Fn(&PendingTransfer) -> bool,
    {
        let mut matches: Vec<PendingTransfer> = self
            .transfers
            .iter()
            .map(|entry| entry.value().lock().unwrap().clone())
            .filter(|t| predicate(t))
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matches
    }
}

#[async_trait]
impl PendingStore for MemoryPendingStore {
    async fn create(&self, transfer: PendingTransfer) -> Result<(), FlowError> {
        self.transfers.insert(transfer.id, Mutex::new(transfer));
        Ok(())
    }

    async fn get(&self, id: PendingTransferId) -> Result<Option<PendingTransfer>, FlowError> {
        Ok(self
            .transfers
            .get(&id)
            .map(|entry| entry.value().lock().unwrap().clone()))
    }

    async fn transition_if(
        &self,
        id: PendingTransferId,
        expected: PendingState,
        next: PendingState,
        at: DateTime<Utc>,
    ) -> Result<bool, FlowError> {
        let entry = match self.transfers.get(&id) {
            Some(entry) => entry,
            None => return Ok(false),
        };
        let mut transfer = entry.value().lock().unwrap();
        if transfer.state != expected {
            return Ok(false);
        }
        transfer.state = next;
        match next {
            PendingState::Accepted => transfer.accepted_at = Some(at),
            PendingState::Cancelled => transfer.cancelled_at = Some(at),
            _ => {}
        }
        Ok(true)
    }

    async fn list_incoming(&self, user: UserId) -> Result<Vec<PendingTransfer>, FlowError> {
        Ok(self.list_matching(|t| t.recipient_user == user))
    }

    async fn list_outgoing(&self, user: UserId) -> Result<Vec<PendingTransfer>, FlowError> {
        Ok(self.list_matching(|t| t.sender_user == user))
    }
}

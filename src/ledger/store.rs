//! Ledger Store trait: the atomic balance-mutation seam.
//!
//! Implementations (in-memory for dev/test, PostgreSQL for production) must
//! run every balance-check-then-mutate sequence as one serializable unit
//! against the account rows involved. A naive fetch / compute / write-back
//! split is exactly the bug class this seam exists to forbid.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, UserId};

use super::account::Account;
use super::entry::{EntryKind, LedgerEntry};
use super::error::LedgerError;

/// Parameters of one atomic two-leg transfer.
#[derive(Debug, Clone)]
pub struct TransferExecution {
    pub sender: AccountId,
    pub recipient: AccountId,
    /// Positive magnitude, two decimal places.
    pub amount: Decimal,
    pub description: Option<String>,
    /// Idempotency key. Retrying with the same key after an ambiguous
    /// outcome returns the previously-recorded receipt instead of
    /// double-applying.
    pub reference_id: String,
}

/// Result of a committed transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub reference_id: String,
    pub sender_balance_after: Decimal,
    pub recipient_balance_after: Decimal,
}

/// Read-side balance push emitted after a committed mutation. Optional for
/// correctness; never on the critical path of a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub account_id: AccountId,
    pub balance: Decimal,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create a wallet for `user_id` with a generated address. When
    /// `welcome_bonus > 0` the bonus is credited atomically as the wallet's
    /// first ledger entry (kind `earning`).
    async fn open_account(
        &self,
        user_id: UserId,
        daily_transfer_limit: Decimal,
        welcome_bonus: Decimal,
    ) -> Result<Account, LedgerError>;

    async fn account(&self, id: AccountId) -> Result<Account, LedgerError>;

    async fn account_by_user(&self, user_id: UserId) -> Result<Account, LedgerError>;

    async fn account_by_address(&self, address: &str) -> Result<Account, LedgerError>;

    /// The atomic transfer primitive (spec'd preconditions checked inside the
    /// same atomic unit as the mutation):
    ///
    /// - `amount > 0`, sender != recipient
    /// - both accounts exist and are active
    /// - sender balance >= amount
    ///
    /// On success: sender debited, recipient credited, one `transfer_out` and
    /// one `transfer_in` entry written sharing `reference_id`, both
    /// `completed`. On any failure nothing is applied.
    async fn execute_transfer(
        &self,
        exec: &TransferExecution,
    ) -> Result<TransferReceipt, LedgerError>;

    /// Receipt of a committed transfer with this `reference_id`, if one
    /// exists. A present receipt is authoritative: the funds moved, whatever
    /// any surrounding workflow row claims.
    async fn receipt(&self, reference_id: &str) -> Result<Option<TransferReceipt>, LedgerError>;

    /// Single-account credit or debit (admin adjustments, earnings,
    /// purchases, refunds). Direction comes from `kind`. A debit that would
    /// drive the balance negative fails with `InsufficientFunds`; nothing is
    /// applied. Returns the new balance.
    async fn adjust(
        &self,
        account_id: AccountId,
        kind: EntryKind,
        amount: Decimal,
        description: &str,
    ) -> Result<Decimal, LedgerError>;

    /// Freeze or unfreeze an account.
    async fn set_active(&self, account_id: AccountId, active: bool) -> Result<(), LedgerError>;

    /// Change an account's per-transfer cap. Takes effect for commits from
    /// that point on, including accepts of already-offered transfers.
    async fn set_daily_limit(
        &self,
        account_id: AccountId,
        limit: Decimal,
    ) -> Result<(), LedgerError>;

    /// Entries for an account, newest first.
    async fn entries(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, LedgerError>;
}

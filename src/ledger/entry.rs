//! Append-only ledger entries.
//!
//! Every balance change writes exactly one entry per affected account.
//! Entries are immutable once written; replaying an account's entries in
//! creation order and summing signed amounts must reproduce its balance.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::AccountId;

/// Entry kind. The amount on an entry is an unsigned magnitude; the kind
/// carries the direction.
///
/// Kind IDs are designed for PostgreSQL storage as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum EntryKind {
    /// Marketplace purchase (debit)
    Purchase = 1,
    /// Funds received via transfer (credit)
    TransferIn = 2,
    /// Funds sent via transfer (debit)
    TransferOut = 3,
    /// Task/engagement reward or signup bonus (credit)
    Earning = 4,
    /// Purchase refund (credit)
    Refund = 5,
    /// Administrative credit
    AdminCredit = 6,
    /// Administrative debit
    AdminDebit = 7,
}

impl EntryKind {
    /// True when the entry increases the account balance.
    #[inline]
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            EntryKind::TransferIn | EntryKind::Earning | EntryKind::Refund | EntryKind::AdminCredit
        )
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(EntryKind::Purchase),
            2 => Some(EntryKind::TransferIn),
            3 => Some(EntryKind::TransferOut),
            4 => Some(EntryKind::Earning),
            5 => Some(EntryKind::Refund),
            6 => Some(EntryKind::AdminCredit),
            7 => Some(EntryKind::AdminDebit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Purchase => "purchase",
            EntryKind::TransferIn => "transfer_in",
            EntryKind::TransferOut => "transfer_out",
            EntryKind::Earning => "earning",
            EntryKind::Refund => "refund",
            EntryKind::AdminCredit => "admin_credit",
            EntryKind::AdminDebit => "admin_debit",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry status. Ledger commits write `Completed` directly; the other states
/// exist for externally-settled operations that report back later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum EntryStatus {
    Pending = 0,
    Completed = 1,
    Failed = -1,
    Cancelled = -2,
}

impl EntryStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(EntryStatus::Pending),
            1 => Some(EntryStatus::Completed),
            -1 => Some(EntryStatus::Failed),
            -2 => Some(EntryStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Completed => "completed",
            EntryStatus::Failed => "failed",
            EntryStatus::Cancelled => "cancelled",
        }
    }
}

/// One immutable ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub account_id: AccountId,
    pub kind: EntryKind,
    /// Unsigned magnitude; direction comes from `kind`.
    pub amount: Decimal,
    /// Account balance immediately after this entry applied. Lets auditors
    /// reconstruct state without replaying the whole log.
    pub balance_after: Decimal,
    /// The other account of a transfer, when there is one.
    pub counterparty: Option<AccountId>,
    pub description: Option<String>,
    /// Idempotency key; both legs of one transfer share it.
    pub reference_id: Option<String>,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Signed amount: positive for credits, negative for debits.
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

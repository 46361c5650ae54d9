//! Ledger Store error types.

use thiserror::Error;

use crate::core_types::AccountId;

/// Errors raised by the atomic balance primitive and account operations.
///
/// Every failure leaves balances and the entry log untouched: the store
/// validates inside the same atomic unit that mutates.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Sender and recipient account cannot be the same")]
    SameAccount,

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("No wallet exists for this user")]
    WalletNotFound,

    #[error("A wallet already exists for this user")]
    WalletExists,

    #[error("Address not found: {0}")]
    AddressNotFound(String),

    #[error("Account {0} is frozen")]
    AccountFrozen(AccountId),

    #[error("Insufficient balance")]
    InsufficientFunds,

    #[error("Store error: {0}")]
    StoreError(String),
}

impl LedgerError {
    /// Stable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::SameAccount => "SAME_ACCOUNT",
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            LedgerError::WalletNotFound => "WALLET_NOT_FOUND",
            LedgerError::WalletExists => "WALLET_EXISTS",
            LedgerError::AddressNotFound(_) => "ADDRESS_NOT_FOUND",
            LedgerError::AccountFrozen(_) => "ACCOUNT_FROZEN",
            LedgerError::InsufficientFunds => "INSUFFICIENT_BALANCE",
            LedgerError::StoreError(_) => "STORE_ERROR",
        }
    }

    /// HTTP status code suggestion.
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::InvalidAmount | LedgerError::SameAccount | LedgerError::WalletExists => {
                400
            }
            LedgerError::AccountNotFound(_)
            | LedgerError::WalletNotFound
            | LedgerError::AddressNotFound(_) => 404,
            LedgerError::AccountFrozen(_) | LedgerError::InsufficientFunds => 422,
            LedgerError::StoreError(_) => 500,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::StoreError(e.to_string())
    }
}

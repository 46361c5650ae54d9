//! Transfer-flow error types.
//!
//! The orchestrator does not reinterpret store errors; it forwards them,
//! adding flow context only where the sender's situation changed between
//! offer and accept.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::money::MoneyError;
use crate::otp::OtpError;
use rust_decimal::Decimal;

use super::state::PendingState;

#[derive(Error, Debug, Clone)]
pub enum FlowError {
    #[error("Minimum transfer is {min} TAU")]
    BelowMinimum { min: Decimal },

    #[error("Amount exceeds your transfer limit of {limit} TAU")]
    OverDailyLimit { limit: Decimal },

    #[error("{0}")]
    InvalidAmount(#[from] MoneyError),

    #[error("Recipient address not found")]
    RecipientNotFound,

    #[error("Cannot transfer to your own wallet")]
    SelfTransfer,

    #[error("Pending transfer not found")]
    PendingNotFound,

    /// Wrong user attempting accept/cancel. Deliberately generic: no leakage
    /// of which check failed.
    #[error("Not allowed")]
    Forbidden,

    #[error("Transfer already {0}")]
    AlreadyResolved(PendingState),

    #[error("Transfer offer has expired")]
    TransferExpired,

    /// Insufficient balance discovered at accept time: the sender's balance
    /// changed between offer and accept.
    #[error("Sender no longer has sufficient balance")]
    SenderBalanceChanged,

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Store error: {0}")]
    StoreError(String),
}

impl FlowError {
    /// Stable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::BelowMinimum { .. } => "BELOW_MINIMUM",
            FlowError::OverDailyLimit { .. } => "OVER_TRANSFER_LIMIT",
            FlowError::InvalidAmount(_) => "INVALID_AMOUNT",
            FlowError::RecipientNotFound => "RECIPIENT_NOT_FOUND",
            FlowError::SelfTransfer => "SELF_TRANSFER",
            FlowError::PendingNotFound => "PENDING_NOT_FOUND",
            FlowError::Forbidden => "FORBIDDEN",
            FlowError::AlreadyResolved(_) => "ALREADY_RESOLVED",
            FlowError::TransferExpired => "TRANSFER_EXPIRED",
            FlowError::SenderBalanceChanged => "INSUFFICIENT_BALANCE",
            FlowError::Otp(e) => e.code(),
            FlowError::Ledger(e) => e.code(),
            FlowError::StoreError(_) => "STORE_ERROR",
        }
    }

    /// HTTP status code suggestion.
    pub fn http_status(&self) -> u16 {
        match self {
            FlowError::BelowMinimum { .. }
            | FlowError::InvalidAmount(_)
            | FlowError::SelfTransfer => 400,
            FlowError::OverDailyLimit { .. } | FlowError::SenderBalanceChanged => 422,
            FlowError::RecipientNotFound | FlowError::PendingNotFound => 404,
            FlowError::Forbidden => 403,
            FlowError::AlreadyResolved(_) | FlowError::TransferExpired => 409,
            FlowError::Otp(e) => e.http_status(),
            FlowError::Ledger(e) => e.http_status(),
            FlowError::StoreError(_) => 500,
        }
    }
}

impl From<sqlx::Error> for FlowError {
    fn from(e: sqlx::Error) -> Self {
        FlowError::StoreError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_user_visible_messages() {
        // Routine, recoverable failures must not collapse into one generic
        // message.
        let messages = [
            FlowError::Ledger(LedgerError::InsufficientFunds).to_string(),
            FlowError::Otp(OtpError::InvalidCode).to_string(),
            FlowError::AlreadyResolved(PendingState::Accepted).to_string(),
            FlowError::TransferExpired.to_string(),
        ];
        let unique: std::collections::HashSet<&String> = messages.iter().collect();
        assert_eq!(unique.len(), messages.len());
    }

    #[test]
    fn test_nested_codes_pass_through() {
        assert_eq!(
            FlowError::Otp(OtpError::TooManyAttempts).code(),
            "TOO_MANY_ATTEMPTS"
        );
        assert_eq!(
            FlowError::Ledger(LedgerError::InsufficientFunds).code(),
            "INSUFFICIENT_BALANCE"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(FlowError::Forbidden.http_status(), 403);
        assert_eq!(
            FlowError::AlreadyResolved(PendingState::Cancelled).http_status(),
            409
        );
        assert_eq!(
            FlowError::BelowMinimum {
                min: Decimal::from(3)
            }
            .http_status(),
            400
        );
    }
}

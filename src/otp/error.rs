//! OTP Challenge Manager error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    #[error("Verification challenge not found")]
    ChallengeNotFound,

    /// The challenge belongs to a different user. Surfaced with the same
    /// wording as not-found so probing reveals nothing.
    #[error("Verification challenge not found")]
    WrongOwner,

    #[error("Verification code already used")]
    AlreadyUsed,

    #[error("Verification code expired, request a new one")]
    Expired,

    #[error("Too many failed attempts, request a new code")]
    TooManyAttempts,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Store error: {0}")]
    StoreError(String),
}

impl OtpError {
    pub fn code(&self) -> &'static str {
        match self {
            OtpError::ChallengeNotFound => "CHALLENGE_NOT_FOUND",
            OtpError::WrongOwner => "CHALLENGE_NOT_FOUND",
            OtpError::AlreadyUsed => "CODE_ALREADY_USED",
            OtpError::Expired => "CODE_EXPIRED",
            OtpError::TooManyAttempts => "TOO_MANY_ATTEMPTS",
            OtpError::InvalidCode => "INVALID_CODE",
            OtpError::StoreError(_) => "STORE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            OtpError::ChallengeNotFound | OtpError::WrongOwner => 404,
            OtpError::AlreadyUsed | OtpError::Expired | OtpError::TooManyAttempts => 409,
            OtpError::InvalidCode => 400,
            OtpError::StoreError(_) => 500,
        }
    }
}

impl From<sqlx::Error> for OtpError {
    fn from(e: sqlx::Error) -> Self {
        OtpError::StoreError(e.to_string())
    }
}

//! Core type definitions shared across the ledger.
//!
//! Keep this module dependency-free within the crate: everything else imports
//! from here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// User identifier, assigned by the authentication collaborator.
pub type UserId = u64;

/// Wallet account identifier, assigned by the ledger store.
pub type AccountId = u64;

/// Verified caller identity, supplied by the authentication collaborator
/// on every call. The core trusts it completely and never consults any
/// ambient session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }
}

/// OTP challenge identifier.
///
/// ULID-based: monotonic, sortable, no coordination needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OtpId(ulid::Ulid);

impl OtpId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for OtpId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OtpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OtpId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Pending transfer identifier (ULID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingTransferId(ulid::Ulid);

impl PendingTransferId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for PendingTransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PendingTransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PendingTransferId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

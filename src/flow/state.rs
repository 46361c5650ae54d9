//! Pending-offer state definitions.
//!
//! State IDs are designed for PostgreSQL storage as SMALLINT.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pending transfer states.
///
/// Exactly one terminal transition is allowed from `Pending`; terminal states
/// never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum PendingState {
    /// Offer created, funds NOT deducted from the sender.
    Pending = 0,

    /// Terminal: recipient accepted, ledger commit done.
    Accepted = 10,

    /// Terminal: sender revoked the offer before acceptance.
    Cancelled = -10,

    /// Terminal: offer passed its expiry unaccepted.
    Expired = -20,
}

impl PendingState {
    /// Check if this is a terminal state (no more transitions possible).
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PendingState::Pending)
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(PendingState::Pending),
            10 => Some(PendingState::Accepted),
            -10 => Some(PendingState::Cancelled),
            -20 => Some(PendingState::Expired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PendingState::Pending => "pending",
            PendingState::Accepted => "accepted",
            PendingState::Cancelled => "cancelled",
            PendingState::Expired => "expired",
        }
    }
}

impl fmt::Display for PendingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for PendingState {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        PendingState::from_id(value).ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!PendingState::Pending.is_terminal());
        assert!(PendingState::Accepted.is_terminal());
        assert!(PendingState::Cancelled.is_terminal());
        assert!(PendingState::Expired.is_terminal());
    }

    #[test]
    fn test_state_id_roundtrip() {
        for state in [
            PendingState::Pending,
            PendingState::Accepted,
            PendingState::Cancelled,
            PendingState::Expired,
        ] {
            assert_eq!(PendingState::from_id(state.id()), Some(state));
        }
    }

    #[test]
    fn test_invalid_state_id() {
        assert!(PendingState::from_id(99).is_none());
        assert!(PendingState::from_id(-99).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(PendingState::Pending.to_string(), "pending");
        assert_eq!(PendingState::Expired.to_string(), "expired");
    }
}

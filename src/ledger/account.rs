//! Wallet account record.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, UserId};

/// Prefix of every wallet address.
pub const ADDRESS_PREFIX: &str = "TAU-";

/// One wallet per user.
///
/// `balance` is never assigned directly from call sites: all mutation flows
/// through the store's atomic primitives, which hold the account row lock for
/// the whole check-and-mutate sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    /// Human-presentable unique address, e.g. `TAU-7K2QX9FM`.
    pub address: String,
    pub balance: Decimal,
    /// Frozen accounts reject all incoming and outgoing commits.
    pub active: bool,
    /// Per-transfer cap.
    pub daily_transfer_limit: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Generate a fresh wallet address: `TAU-` plus 8 characters from an
/// unambiguous uppercase alphabet (no 0/O, 1/I).
pub fn generate_address() -> String {
    const ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}{}", ADDRESS_PREFIX, suffix)
}

//! OTP challenge record and code generation.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{OtpId, UserId};

/// A short-lived secret bound to one proposed transfer.
///
/// Single-use: once `used_at` is set the challenge can never validate again.
/// The recipient is captured as an address string, not a resolved account id;
/// resolution happens again at commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub id: OtpId,
    pub user_id: UserId,
    /// 6-digit numeric code, uniformly random.
    pub code: String,
    pub recipient_address: String,
    pub amount: Decimal,
    pub purpose: Option<String>,
    /// Failed code-match attempts so far.
    pub attempts: u8,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Transfer parameters released by a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpPayload {
    pub recipient_address: String,
    pub amount: Decimal,
    pub purpose: Option<String>,
}

impl OtpChallenge {
    pub fn payload(&self) -> OtpPayload {
        OtpPayload {
            recipient_address: self.recipient_address.clone(),
            amount: self.amount,
            purpose: self.purpose.clone(),
        }
    }
}

/// Uniformly random 6-digit code, zero-padded. Never sequential or
/// timestamp-derived.
pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_shape() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_codes_vary() {
        let codes: std::collections::HashSet<String> = (0..50).map(|_| generate_code()).collect();
        // 50 draws from a million values colliding down to 1 would mean a
        // broken RNG
        assert!(codes.len() > 1);
    }
}

//! OTP Challenge Manager.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::info;

use crate::core_types::{Identity, OtpId, UserId};
use crate::money;
use crate::notify::{NotificationSink, deliver};

use super::challenge::{OtpChallenge, OtpPayload, generate_code};
use super::error::OtpError;
use super::store::OtpStore;

pub struct OtpManager {
    store: Arc<dyn OtpStore>,
    sink: Arc<dyn NotificationSink>,
    ttl: Duration,
    max_attempts: u8,
}

impl OtpManager {
    pub fn new(
        store: Arc<dyn OtpStore>,
        sink: Arc<dyn NotificationSink>,
        ttl_secs: i64,
        max_attempts: u8,
    ) -> Self {
        Self {
            store,
            sink,
            ttl: Duration::seconds(ttl_secs),
            max_attempts,
        }
    }

    /// Create a challenge bound to the proposed transfer and hand the code to
    /// the notification sink. Delivery failure does not fail issuance; the
    /// code stays valid and the degraded mode is logged by the sink path.
    pub async fn issue(
        &self,
        identity: &Identity,
        recipient_address: &str,
        amount: Decimal,
        purpose: Option<String>,
    ) -> Result<OtpId, OtpError> {
        let now = Utc::now();
        let challenge = OtpChallenge {
            id: OtpId::new(),
            user_id: identity.user_id,
            code: generate_code(),
            recipient_address: recipient_address.to_string(),
            amount,
            purpose,
            attempts: 0,
            expires_at: now + self.ttl,
            used_at: None,
            created_at: now,
        };
        let id = challenge.id;
        let code = challenge.code.clone();
        self.store.insert(challenge).await?;

        info!(otp_id = %id, user_id = identity.user_id, "OTP challenge issued");

        let body = format!(
            "Your transfer verification code is {}. It expires in {} minutes.\n\
             Transfer: {} TAU to {}.",
            code,
            self.ttl.num_minutes(),
            money::format_amount(amount),
            recipient_address,
        );
        deliver(
            self.sink.as_ref(),
            &identity.email,
            "Your TAU transfer verification code",
            &body,
        )
        .await;

        Ok(id)
    }

    /// Validate a submitted code and consume the challenge. See
    /// [`OtpStore::consume`] for the check order and atomicity contract.
    pub async fn verify(
        &self,
        id: OtpId,
        user_id: UserId,
        code: &str,
    ) -> Result<OtpPayload, OtpError> {
        self.store
            .consume(id, user_id, code.trim(), Utc::now(), self.max_attempts)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemorySink;
    use crate::otp::store::MemoryOtpStore;

    fn manager_with_sink() -> (OtpManager, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let manager = OtpManager::new(
            Arc::new(MemoryOtpStore::new()),
            sink.clone(),
            300,
            3,
        );
        (manager, sink)
    }

    fn alice() -> Identity {
        Identity::new(1, "alice@tau.dev")
    }

    async fn issue_and_grab_code(
        manager: &OtpManager,
        sink: &MemorySink,
    ) -> (OtpId, String) {
        let id = manager
            .issue(&alice(), "TAU-RECIPNT1", Decimal::from(10), Some("gift".into()))
            .await
            .unwrap();
        let mail = sink.sent().pop().unwrap();
        // Code is the 6-digit run in the mail body
        let code = mail
            .body
            .split(|c: char| !c.is_ascii_digit())
            .find(|s| s.len() == 6)
            .unwrap()
            .to_string();
        (id, code)
    }

    #[tokio::test]
    async fn test_issue_delivers_code_to_caller() {
        let (manager, sink) = manager_with_sink();
        manager
            .issue(&alice(), "TAU-RECIPNT1", Decimal::from(10), None)
            .await
            .unwrap();
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@tau.dev");
        assert!(sent[0].body.contains("10.00 TAU"));
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_fail_issuance() {
        let (manager, sink) = manager_with_sink();
        sink.set_failing(true);
        let result = manager
            .issue(&alice(), "TAU-RECIPNT1", Decimal::from(10), None)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_verify_happy_path_releases_payload() {
        let (manager, sink) = manager_with_sink();
        let (id, code) = issue_and_grab_code(&manager, &sink).await;

        let payload = manager.verify(id, 1, &code).await.unwrap();
        assert_eq!(payload.recipient_address, "TAU-RECIPNT1");
        assert_eq!(payload.amount, Decimal::from(10));
        assert_eq!(payload.purpose.as_deref(), Some("gift"));
    }

    #[tokio::test]
    async fn test_single_use() {
        let (manager, sink) = manager_with_sink();
        let (id, code) = issue_and_grab_code(&manager, &sink).await;

        manager.verify(id, 1, &code).await.unwrap();
        // Replay with the correct code must fail
        assert_eq!(
            manager.verify(id, 1, &code).await.unwrap_err(),
            OtpError::AlreadyUsed
        );
    }

    #[tokio::test]
    async fn test_attempt_ceiling_locks_challenge() {
        let (manager, sink) = manager_with_sink();
        let (id, code) = issue_and_grab_code(&manager, &sink).await;
        let wrong = if code == "000000" { "000001" } else { "000000" };

        for _ in 0..3 {
            assert_eq!(
                manager.verify(id, 1, wrong).await.unwrap_err(),
                OtpError::InvalidCode
            );
        }
        // Fourth attempt with the CORRECT code still fails
        assert_eq!(
            manager.verify(id, 1, &code).await.unwrap_err(),
            OtpError::TooManyAttempts
        );
    }

    #[tokio::test]
    async fn test_wrong_owner_rejected() {
        let (manager, sink) = manager_with_sink();
        let (id, code) = issue_and_grab_code(&manager, &sink).await;
        assert_eq!(
            manager.verify(id, 99, &code).await.unwrap_err(),
            OtpError::WrongOwner
        );
    }

    #[tokio::test]
    async fn test_expired_challenge_rejected_with_correct_code() {
        let sink = Arc::new(MemorySink::new());
        // Zero TTL: expires immediately
        let manager = OtpManager::new(Arc::new(MemoryOtpStore::new()), sink.clone(), 0, 3);
        let (id, code) = issue_and_grab_code(&manager, &sink).await;
        assert_eq!(
            manager.verify(id, 1, &code).await.unwrap_err(),
            OtpError::Expired
        );
    }

    #[tokio::test]
    async fn test_unknown_challenge() {
        let (manager, _) = manager_with_sink();
        assert_eq!(
            manager.verify(OtpId::new(), 1, "123456").await.unwrap_err(),
            OtpError::ChallengeNotFound
        );
    }
}

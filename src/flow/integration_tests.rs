//! Orchestrator integration tests over the in-memory stores.
//!
//! Covers the full protocol: initiate → OTP → pending offer → accept/cancel,
//! the immediate-confirm flow, lazy expiry, and the administrative paths.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::audit::MemoryAuditLog;
use crate::config::LedgerConfig;
use crate::core_types::Identity;
use crate::ledger::{LedgerError, LedgerStore, MemoryLedger, TransferExecution};
use crate::notify::{MemoryDirectory, MemorySink};
use crate::otp::{MemoryOtpStore, OtpManager};

use super::admin::{AdjustDirection, AdminService};
use super::error::FlowError;
use super::orchestrator::TransferOrchestrator;
use super::pending::MemoryPendingStore;
use super::state::PendingState;

struct TestEnv {
    orchestrator: TransferOrchestrator,
    admin: AdminService,
    ledger: Arc<MemoryLedger>,
    sink: Arc<MemorySink>,
}

impl TestEnv {
    fn new(cfg: LedgerConfig) -> Self {
        let ledger = Arc::new(MemoryLedger::new());
        let sink = Arc::new(MemorySink::new());
        let directory = Arc::new(MemoryDirectory::new());
        directory.insert(1, "alice@tau.dev");
        directory.insert(2, "bob@tau.dev");
        let audit = Arc::new(MemoryAuditLog::new());

        let otp = OtpManager::new(
            Arc::new(MemoryOtpStore::new()),
            sink.clone(),
            cfg.otp_ttl_secs,
            cfg.otp_max_attempts,
        );
        let orchestrator = TransferOrchestrator::new(
            ledger.clone(),
            otp,
            Arc::new(MemoryPendingStore::new()),
            sink.clone(),
            directory.clone(),
            cfg,
        );
        let admin = AdminService::new(ledger.clone(), audit, sink.clone(), directory);
        Self {
            orchestrator,
            admin,
            ledger,
            sink,
        }
    }

    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }

    /// The 6-digit code from the most recent OTP mail.
    fn last_code(&self) -> String {
        let mail = self
            .sink
            .sent()
            .into_iter()
            .rev()
            .find(|m| m.subject.contains("verification code"))
            .expect("no OTP mail sent");
        mail.body
            .split(|c: char| !c.is_ascii_digit())
            .find(|s| s.len() == 6)
            .expect("no code in OTP mail")
            .to_string()
    }
}

fn alice() -> Identity {
    Identity::new(1, "alice@tau.dev")
}

fn bob() -> Identity {
    Identity::new(2, "bob@tau.dev")
}

fn root() -> Identity {
    Identity::new(999, "admin@tau.dev")
}

/// Open wallets for alice and bob with the given bonuses, returning their
/// accounts.
async fn open_wallets(
    env: &TestEnv,
    alice_balance: i64,
    bob_balance: i64,
) -> (crate::ledger::Account, crate::ledger::Account) {
    let a = env
        .ledger
        .open_account(1, Decimal::from(500), Decimal::from(alice_balance))
        .await
        .unwrap();
    let b = env
        .ledger
        .open_account(2, Decimal::from(500), Decimal::from(bob_balance))
        .await
        .unwrap();
    (a, b)
}

#[tokio::test]
async fn test_happy_path_pending_accept() {
    let env = TestEnv::default();
    let (a, b) = open_wallets(&env, 100, 0).await;

    let otp_id = env
        .orchestrator
        .initiate_transfer(&alice(), &b.address, Decimal::from(10), Some("gift".into()))
        .await
        .unwrap();
    let code = env.last_code();

    let pending = env
        .orchestrator
        .verify_and_create_pending(&alice(), otp_id, &code)
        .await
        .unwrap();
    assert_eq!(pending.state, PendingState::Pending);

    // Offer created: no money moved yet
    assert_eq!(env.ledger.account(a.id).await.unwrap().balance, Decimal::from(100));
    assert_eq!(env.ledger.account(b.id).await.unwrap().balance, Decimal::ZERO);

    let receipt = env
        .orchestrator
        .accept_pending(&bob(), pending.id)
        .await
        .unwrap();
    assert_eq!(receipt.sender_balance_after, Decimal::from(90));
    assert_eq!(receipt.recipient_balance_after, Decimal::from(10));

    // Two completed entries share the offer's reference id
    let out = env.ledger.entries(a.id, 10).await.unwrap();
    let inn = env.ledger.entries(b.id, 10).await.unwrap();
    assert_eq!(out[0].reference_id.as_deref(), Some(pending.reference_id().as_str()));
    assert_eq!(out[0].reference_id, inn[0].reference_id);
}

#[tokio::test]
async fn test_pending_offer_does_not_touch_balances() {
    let env = TestEnv::default();
    let (a, b) = open_wallets(&env, 50, 0).await;
    let supply_before = env.ledger.total_supply();

    let otp_id = env
        .orchestrator
        .initiate_transfer(&alice(), &b.address, Decimal::from(20), None)
        .await
        .unwrap();
    env.orchestrator
        .verify_and_create_pending(&alice(), otp_id, &env.last_code())
        .await
        .unwrap();

    assert_eq!(env.ledger.account(a.id).await.unwrap().balance, Decimal::from(50));
    assert_eq!(env.ledger.total_supply(), supply_before);
}

#[tokio::test]
async fn test_insufficient_funds_at_accept_time() {
    let env = TestEnv::default();
    let (a, b) = open_wallets(&env, 10, 0).await;

    let otp_id = env
        .orchestrator
        .initiate_transfer(&alice(), &b.address, Decimal::from(10), None)
        .await
        .unwrap();
    let pending = env
        .orchestrator
        .verify_and_create_pending(&alice(), otp_id, &env.last_code())
        .await
        .unwrap();

    // Admin debits the sender before the recipient accepts
    env.admin
        .adjust_balance(&root(), a.id, Decimal::from(5), AdjustDirection::Debit, "correction")
        .await
        .unwrap();

    let err = env
        .orchestrator
        .accept_pending(&bob(), pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::SenderBalanceChanged));

    // Balances unchanged, offer still pending (not silently cancelled)
    assert_eq!(env.ledger.account(a.id).await.unwrap().balance, Decimal::from(5));
    assert_eq!(env.ledger.account(b.id).await.unwrap().balance, Decimal::ZERO);
    let incoming = env.orchestrator.list_incoming(2).await.unwrap();
    assert_eq!(incoming[0].state, PendingState::Pending);
}

#[tokio::test]
async fn test_cancelled_offer_cannot_be_accepted() {
    let env = TestEnv::default();
    let (a, b) = open_wallets(&env, 100, 0).await;

    let otp_id = env
        .orchestrator
        .initiate_transfer(&alice(), &b.address, Decimal::from(20), None)
        .await
        .unwrap();
    let pending = env
        .orchestrator
        .verify_and_create_pending(&alice(), otp_id, &env.last_code())
        .await
        .unwrap();

    env.orchestrator
        .cancel_pending(&alice(), pending.id)
        .await
        .unwrap();

    let err = env
        .orchestrator
        .accept_pending(&bob(), pending.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FlowError::AlreadyResolved(PendingState::Cancelled)
    ));
    assert_eq!(env.ledger.account(a.id).await.unwrap().balance, Decimal::from(100));
    assert_eq!(env.ledger.account(b.id).await.unwrap().balance, Decimal::ZERO);
}

#[tokio::test]
async fn test_cancel_yields_to_committed_accept() {
    let env = TestEnv::default();
    let (a, b) = open_wallets(&env, 100, 0).await;

    let otp_id = env
        .orchestrator
        .initiate_transfer(&alice(), &b.address, Decimal::from(10), None)
        .await
        .unwrap();
    let pending = env
        .orchestrator
        .verify_and_create_pending(&alice(), otp_id, &env.last_code())
        .await
        .unwrap();

    // An accept in flight: its ledger commit has landed under the offer's
    // reference id, but the row still reads `pending`.
    env.ledger
        .execute_transfer(&TransferExecution {
            sender: a.id,
            recipient: b.id,
            amount: Decimal::from(10),
            description: None,
            reference_id: pending.reference_id(),
        })
        .await
        .unwrap();

    // The cancel must not report success: the funds have moved.
    let err = env
        .orchestrator
        .cancel_pending(&alice(), pending.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FlowError::AlreadyResolved(PendingState::Accepted)
    ));

    // Row and ledger agree: terminal accepted, balances settled.
    let incoming = env.orchestrator.list_incoming(2).await.unwrap();
    assert_eq!(incoming[0].state, PendingState::Accepted);
    assert_eq!(env.ledger.account(a.id).await.unwrap().balance, Decimal::from(90));
    assert_eq!(env.ledger.account(b.id).await.unwrap().balance, Decimal::from(10));

    // No "cancelled by the sender" mail went out to the recipient
    assert!(!env.sink.sent().iter().any(|m| m.subject.contains("cancelled")));
}

#[tokio::test]
async fn test_minimum_floor_blocks_before_otp() {
    let env = TestEnv::default();
    let (_, b) = open_wallets(&env, 100, 0).await;

    let err = env
        .orchestrator
        .initiate_transfer(&alice(), &b.address, Decimal::from(2), None)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::BelowMinimum { .. }));
    // No OTP was issued
    assert!(env.sink.sent().is_empty());
}

#[tokio::test]
async fn test_expired_offer_cannot_be_accepted() {
    let cfg = LedgerConfig {
        pending_ttl_hours: 0, // offers expire immediately
        ..LedgerConfig::default()
    };
    let env = TestEnv::new(cfg);
    let (_, b) = open_wallets(&env, 100, 0).await;

    let otp_id = env
        .orchestrator
        .initiate_transfer(&alice(), &b.address, Decimal::from(10), None)
        .await
        .unwrap();
    let pending = env
        .orchestrator
        .verify_and_create_pending(&alice(), otp_id, &env.last_code())
        .await
        .unwrap();
    // The row still reads `pending`; the expiry check must fire anyway.
    assert_eq!(pending.state, PendingState::Pending);

    let err = env
        .orchestrator
        .accept_pending(&bob(), pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::TransferExpired));

    // Lazy transition happened and is visible in the lists
    let incoming = env.orchestrator.list_incoming(2).await.unwrap();
    assert_eq!(incoming[0].state, PendingState::Expired);

    // Cancel after expiry fails too
    let err = env
        .orchestrator
        .cancel_pending(&alice(), pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::TransferExpired));
}

#[tokio::test]
async fn test_immediate_confirm_flow() {
    let env = TestEnv::default();
    let (a, b) = open_wallets(&env, 100, 0).await;

    let otp_id = env
        .orchestrator
        .initiate_transfer(&alice(), &b.address, Decimal::from(25), None)
        .await
        .unwrap();
    let receipt = env
        .orchestrator
        .verify_and_commit(&alice(), otp_id, &env.last_code())
        .await
        .unwrap();

    assert_eq!(receipt.sender_balance_after, Decimal::from(75));
    assert_eq!(receipt.recipient_balance_after, Decimal::from(25));
    assert_eq!(env.ledger.account(a.id).await.unwrap().balance, Decimal::from(75));
    assert_eq!(env.ledger.account(b.id).await.unwrap().balance, Decimal::from(25));

    // Both parties got a settlement mail
    let sent = env.sink.sent();
    assert!(sent.iter().any(|m| m.subject == "TAU transfer sent"));
    assert!(sent.iter().any(|m| m.subject == "TAU transfer received"));
}

#[tokio::test]
async fn test_only_recipient_accepts_only_sender_cancels() {
    let env = TestEnv::default();
    let (_, b) = open_wallets(&env, 100, 0).await;

    let otp_id = env
        .orchestrator
        .initiate_transfer(&alice(), &b.address, Decimal::from(10), None)
        .await
        .unwrap();
    let pending = env
        .orchestrator
        .verify_and_create_pending(&alice(), otp_id, &env.last_code())
        .await
        .unwrap();

    // Sender cannot accept their own offer
    let err = env
        .orchestrator
        .accept_pending(&alice(), pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Forbidden));

    // Recipient cannot cancel
    let err = env
        .orchestrator
        .cancel_pending(&bob(), pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Forbidden));
}

#[tokio::test]
async fn test_limit_lowered_between_offer_and_accept() {
    let env = TestEnv::default();
    let (a, b) = open_wallets(&env, 100, 0).await;

    let otp_id = env
        .orchestrator
        .initiate_transfer(&alice(), &b.address, Decimal::from(50), None)
        .await
        .unwrap();
    let pending = env
        .orchestrator
        .verify_and_create_pending(&alice(), otp_id, &env.last_code())
        .await
        .unwrap();

    // Admin tightens the sender's cap below the offered amount
    env.admin
        .set_daily_limit(&root(), a.id, Decimal::from(20))
        .await
        .unwrap();

    let err = env
        .orchestrator
        .accept_pending(&bob(), pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::OverDailyLimit { .. }));
    assert_eq!(env.ledger.account(a.id).await.unwrap().balance, Decimal::from(100));
}

#[tokio::test]
async fn test_frozen_recipient_blocks_accept() {
    let env = TestEnv::default();
    let (_, b) = open_wallets(&env, 100, 0).await;

    let otp_id = env
        .orchestrator
        .initiate_transfer(&alice(), &b.address, Decimal::from(10), None)
        .await
        .unwrap();
    let pending = env
        .orchestrator
        .verify_and_create_pending(&alice(), otp_id, &env.last_code())
        .await
        .unwrap();

    env.admin
        .set_account_active(&root(), b.id, false, Some("review"))
        .await
        .unwrap();

    let err = env
        .orchestrator
        .accept_pending(&bob(), pending.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FlowError::Ledger(LedgerError::AccountFrozen(_))
    ));
}

#[tokio::test]
async fn test_self_transfer_rejected_at_initiate() {
    let env = TestEnv::default();
    let (a, _) = open_wallets(&env, 100, 0).await;

    let err = env
        .orchestrator
        .initiate_transfer(&alice(), &a.address, Decimal::from(10), None)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::SelfTransfer));
}

#[tokio::test]
async fn test_unknown_recipient_rejected_at_initiate() {
    let env = TestEnv::default();
    open_wallets(&env, 100, 0).await;

    let err = env
        .orchestrator
        .initiate_transfer(&alice(), "TAU-NOSUCHAD", Decimal::from(10), None)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::RecipientNotFound));
}

#[tokio::test]
async fn test_open_wallet_credits_bonus_and_mails() {
    let env = TestEnv::default();
    let account = env.orchestrator.open_wallet(&alice()).await.unwrap();
    assert_eq!(account.balance, Decimal::from(100));
    assert!(account.address.starts_with("TAU-"));

    let sent = env.sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Welcome to TAU");
}

#[tokio::test]
async fn test_earning_credit() {
    let env = TestEnv::default();
    let (a, _) = open_wallets(&env, 0, 0).await;

    let new_balance = env
        .orchestrator
        .credit_earning(1, Decimal::from(15), "Task #42 completed")
        .await
        .unwrap();
    assert_eq!(new_balance, Decimal::from(15));

    let entries = env.ledger.entries(a.id, 10).await.unwrap();
    assert_eq!(entries[0].kind, crate::ledger::EntryKind::Earning);
}

#[tokio::test]
async fn test_lists_split_by_direction() {
    let env = TestEnv::default();
    let (_, b) = open_wallets(&env, 100, 0).await;

    let otp_id = env
        .orchestrator
        .initiate_transfer(&alice(), &b.address, Decimal::from(10), None)
        .await
        .unwrap();
    let pending = env
        .orchestrator
        .verify_and_create_pending(&alice(), otp_id, &env.last_code())
        .await
        .unwrap();

    let incoming = env.orchestrator.list_incoming(2).await.unwrap();
    let outgoing = env.orchestrator.list_outgoing(1).await.unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(outgoing.len(), 1);
    assert_eq!(incoming[0].id, pending.id);
    assert!(env.orchestrator.list_incoming(1).await.unwrap().is_empty());
}

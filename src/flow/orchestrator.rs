//! Transfer Orchestrator.
//!
//! Drives a transfer through its states and invokes the ledger's atomic
//! primitive at the commit point. Two flows share everything up to OTP
//! verification:
//!
//! - pending/accept: verification creates a revocable 48h offer; money moves
//!   only when the recipient accepts.
//! - immediate-confirm: verification commits instantly.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::LedgerConfig;
use crate::core_types::{Identity, OtpId, PendingTransferId, UserId};
use crate::ledger::{Account, EntryKind, LedgerEntry, LedgerError, LedgerStore, TransferExecution, TransferReceipt};
use crate::money;
use crate::notify::{NotificationSink, UserDirectory, deliver, deliver_to_user};
use crate::otp::{OtpManager, OtpPayload};

use super::error::FlowError;
use super::pending::{PendingStore, PendingTransfer};
use super::state::PendingState;

pub struct TransferOrchestrator {
    ledger: Arc<dyn LedgerStore>,
    otp: OtpManager,
    pending: Arc<dyn PendingStore>,
    sink: Arc<dyn NotificationSink>,
    directory: Arc<dyn UserDirectory>,
    cfg: LedgerConfig,
}

impl TransferOrchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        otp: OtpManager,
        pending: Arc<dyn PendingStore>,
        sink: Arc<dyn NotificationSink>,
        directory: Arc<dyn UserDirectory>,
        cfg: LedgerConfig,
    ) -> Self {
        Self {
            ledger,
            otp,
            pending,
            sink,
            directory,
            cfg,
        }
    }

    /// Open a wallet for the caller and credit the welcome bonus.
    pub async fn open_wallet(&self, identity: &Identity) -> Result<Account, FlowError> {
        let account = self
            .ledger
            .open_account(
                identity.user_id,
                self.cfg.default_daily_limit,
                self.cfg.welcome_bonus,
            )
            .await?;
        deliver(
            self.sink.as_ref(),
            &identity.email,
            "Welcome to TAU",
            &format!(
                "Your wallet {} is ready. {} TAU signup bonus credited.",
                account.address,
                money::format_amount(self.cfg.welcome_bonus)
            ),
        )
        .await;
        Ok(account)
    }

    /// Caller's wallet snapshot.
    pub async fn wallet_of(&self, identity: &Identity) -> Result<Account, FlowError> {
        Ok(self.ledger.account_by_user(identity.user_id).await?)
    }

    /// Caller's ledger history, newest first.
    pub async fn history(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, FlowError> {
        let account = self.ledger.account_by_user(identity.user_id).await?;
        Ok(self.ledger.entries(account.id, limit).await?)
    }

    /// Credit a task/engagement reward. Additive only.
    pub async fn credit_earning(
        &self,
        user_id: UserId,
        amount: Decimal,
        description: &str,
    ) -> Result<Decimal, FlowError> {
        let amount = money::validate_amount(amount)?;
        let account = self.ledger.account_by_user(user_id).await?;
        let new_balance = self
            .ledger
            .adjust(account.id, EntryKind::Earning, amount, description)
            .await?;
        info!(user_id, amount = %amount, "Earning credited");
        Ok(new_balance)
    }

    /// `Requested -> OtpPending`: validate the proposed transfer and issue an
    /// OTP challenge. Balance and limit checks here are advisory; the
    /// authoritative ones run inside the ledger commit.
    pub async fn initiate_transfer(
        &self,
        identity: &Identity,
        recipient_address: &str,
        amount: Decimal,
        purpose: Option<String>,
    ) -> Result<OtpId, FlowError> {
        let amount = money::validate_amount(amount)?;
        if amount < self.cfg.min_transfer {
            return Err(FlowError::BelowMinimum {
                min: self.cfg.min_transfer,
            });
        }

        let sender = self.ledger.account_by_user(identity.user_id).await?;
        if !sender.active {
            return Err(LedgerError::AccountFrozen(sender.id).into());
        }
        if amount > sender.daily_transfer_limit {
            return Err(FlowError::OverDailyLimit {
                limit: sender.daily_transfer_limit,
            });
        }
        if sender.balance < amount {
            return Err(LedgerError::InsufficientFunds.into());
        }

        let recipient = self.resolve_recipient(recipient_address, identity.user_id).await?;

        info!(
            user_id = identity.user_id,
            recipient = %recipient.address,
            amount = %amount,
            "Transfer initiated, issuing OTP"
        );
        Ok(self
            .otp
            .issue(identity, &recipient.address, amount, purpose)
            .await?)
    }

    /// `OtpVerified -> PendingOffer` (pending/accept flow): consume the OTP
    /// and create a revocable offer. No ledger mutation happens here.
    pub async fn verify_and_create_pending(
        &self,
        identity: &Identity,
        otp_id: OtpId,
        code: &str,
    ) -> Result<PendingTransfer, FlowError> {
        let payload = self.otp.verify(otp_id, identity.user_id, code).await?;
        let (sender, recipient) = self.resolve_parties(identity, &payload).await?;

        let now = Utc::now();
        let transfer = PendingTransfer {
            id: PendingTransferId::new(),
            sender_account: sender.id,
            sender_user: sender.user_id,
            recipient_account: recipient.id,
            recipient_user: recipient.user_id,
            amount: payload.amount,
            purpose: payload.purpose.clone(),
            state: PendingState::Pending,
            created_at: now,
            expires_at: now + Duration::hours(self.cfg.pending_ttl_hours),
            accepted_at: None,
            cancelled_at: None,
        };
        self.pending.create(transfer.clone()).await?;

        info!(
            pending_id = %transfer.id,
            sender = sender.id,
            recipient = recipient.id,
            amount = %transfer.amount,
            "Pending offer created"
        );
        deliver_to_user(
            self.sink.as_ref(),
            self.directory.as_ref(),
            recipient.user_id,
            "Incoming TAU transfer",
            &format!(
                "{} TAU is waiting for you{}. Accept it within 48 hours.",
                money::format_amount(transfer.amount),
                transfer
                    .purpose
                    .as_deref()
                    .map(|p| format!(" ({})", p))
                    .unwrap_or_default()
            ),
        )
        .await;

        Ok(transfer)
    }

    /// `OtpVerified -> Committed` (immediate-confirm flow): consume the OTP
    /// and commit right away with a fresh reference id.
    pub async fn verify_and_commit(
        &self,
        identity: &Identity,
        otp_id: OtpId,
        code: &str,
    ) -> Result<TransferReceipt, FlowError> {
        let payload = self.otp.verify(otp_id, identity.user_id, code).await?;
        let (sender, recipient) = self.resolve_parties(identity, &payload).await?;

        let receipt = self
            .ledger
            .execute_transfer(&TransferExecution {
                sender: sender.id,
                recipient: recipient.id,
                amount: payload.amount,
                description: payload.purpose.clone(),
                reference_id: format!("transfer_{}", ulid::Ulid::new()),
            })
            .await?;

        info!(
            reference_id = %receipt.reference_id,
            sender = sender.id,
            recipient = recipient.id,
            "Immediate transfer committed"
        );
        self.notify_committed(identity, &recipient, payload.amount, &receipt)
            .await;
        Ok(receipt)
    }

    /// `PendingOffer -> Accepted`: recipient-only; commits through the ledger
    /// primitive with the offer's stable reference id.
    pub async fn accept_pending(
        &self,
        identity: &Identity,
        id: PendingTransferId,
    ) -> Result<TransferReceipt, FlowError> {
        let transfer = self.load_live(id).await?;

        if identity.user_id != transfer.recipient_user {
            return Err(FlowError::Forbidden);
        }

        // Limit must hold at commit time, not just at offer time: a cap
        // lowered in between blocks the accept.
        let sender = self.ledger.account(transfer.sender_account).await?;
        if transfer.amount > sender.daily_transfer_limit {
            return Err(FlowError::OverDailyLimit {
                limit: sender.daily_transfer_limit,
            });
        }

        let receipt = self
            .ledger
            .execute_transfer(&TransferExecution {
                sender: transfer.sender_account,
                recipient: transfer.recipient_account,
                amount: transfer.amount,
                description: transfer.purpose.clone(),
                reference_id: transfer.reference_id(),
            })
            .await
            .map_err(|e| match e {
                // The offer passed its advisory check; the balance changed
                // since. The offer stays pending.
                LedgerError::InsufficientFunds => FlowError::SenderBalanceChanged,
                other => other.into(),
            })?;

        let marked = self
            .pending
            .transition_if(id, PendingState::Pending, PendingState::Accepted, Utc::now())
            .await?;
        if !marked {
            // A cancel or lazy expiry resolved the row between the ledger
            // commit above and this transition. The committed receipt wins;
            // put the row into the state the ledger already reflects.
            warn!(pending_id = %id, "Offer resolved mid-accept, repairing state to accepted");
            for lost_to in [PendingState::Cancelled, PendingState::Expired] {
                if self
                    .pending
                    .transition_if(id, lost_to, PendingState::Accepted, Utc::now())
                    .await?
                {
                    break;
                }
            }
        }

        info!(pending_id = %id, reference_id = %receipt.reference_id, "Pending offer accepted");

        deliver_to_user(
            self.sink.as_ref(),
            self.directory.as_ref(),
            transfer.sender_user,
            "Your TAU transfer was accepted",
            &format!(
                "{} TAU delivered. Your balance is now {}.",
                money::format_amount(transfer.amount),
                money::format_amount(receipt.sender_balance_after)
            ),
        )
        .await;
        deliver(
            self.sink.as_ref(),
            &identity.email,
            "TAU transfer received",
            &format!(
                "{} TAU credited. Your balance is now {}.",
                money::format_amount(transfer.amount),
                money::format_amount(receipt.recipient_balance_after)
            ),
        )
        .await;

        Ok(receipt)
    }

    /// `PendingOffer -> Cancelled`: sender-only. Nothing to unwind, since an
    /// offer never moves funds; a cancel that raced an already-committed
    /// accept yields to the accept.
    pub async fn cancel_pending(
        &self,
        identity: &Identity,
        id: PendingTransferId,
    ) -> Result<(), FlowError> {
        let transfer = self.load_live(id).await?;

        if identity.user_id != transfer.sender_user {
            return Err(FlowError::Forbidden);
        }

        let won = self
            .pending
            .transition_if(id, PendingState::Pending, PendingState::Cancelled, Utc::now())
            .await?;
        if !won {
            // Raced an accept or expiry; report the state we lost to.
            let current = self
                .pending
                .get(id)
                .await?
                .ok_or(FlowError::PendingNotFound)?;
            return Err(match current.state {
                PendingState::Expired => FlowError::TransferExpired,
                state => FlowError::AlreadyResolved(state),
            });
        }

        // Winning the row CAS is not enough: a racing accept may have already
        // run its ledger commit without yet marking the row. The receipt is
        // authoritative; if one exists, hand the row to the accept outcome.
        if self
            .ledger
            .receipt(&transfer.reference_id())
            .await?
            .is_some()
        {
            warn!(pending_id = %id, "Cancel raced a committed accept, yielding to it");
            self.pending
                .transition_if(id, PendingState::Cancelled, PendingState::Accepted, Utc::now())
                .await?;
            return Err(FlowError::AlreadyResolved(PendingState::Accepted));
        }

        info!(pending_id = %id, "Pending offer cancelled");
        deliver_to_user(
            self.sink.as_ref(),
            self.directory.as_ref(),
            transfer.recipient_user,
            "TAU transfer cancelled",
            &format!(
                "The {} TAU transfer offered to you was cancelled by the sender.",
                money::format_amount(transfer.amount)
            ),
        )
        .await;
        Ok(())
    }

    /// Offers addressed to `user`, expiring stale rows lazily on the way out.
    pub async fn list_incoming(&self, user: UserId) -> Result<Vec<PendingTransfer>, FlowError> {
        let transfers = self.pending.list_incoming(user).await?;
        self.expire_due(transfers).await
    }

    /// Offers sent by `user`, expiring stale rows lazily on the way out.
    pub async fn list_outgoing(&self, user: UserId) -> Result<Vec<PendingTransfer>, FlowError> {
        let transfers = self.pending.list_outgoing(user).await?;
        self.expire_due(transfers).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Load a pending transfer, performing the lazy expiry transition first.
    /// Returns only offers still in `Pending`.
    async fn load_live(&self, id: PendingTransferId) -> Result<PendingTransfer, FlowError> {
        let transfer = self
            .pending
            .get(id)
            .await?
            .ok_or(FlowError::PendingNotFound)?;

        if transfer.is_expiry_due(Utc::now()) {
            self.pending
                .transition_if(id, PendingState::Pending, PendingState::Expired, Utc::now())
                .await?;
            return Err(FlowError::TransferExpired);
        }
        match transfer.state {
            PendingState::Pending => Ok(transfer),
            PendingState::Expired => Err(FlowError::TransferExpired),
            state => Err(FlowError::AlreadyResolved(state)),
        }
    }

    async fn expire_due(
        &self,
        mut transfers: Vec<PendingTransfer>,
    ) -> Result<Vec<PendingTransfer>, FlowError> {
        let now = Utc::now();
        for transfer in transfers.iter_mut() {
            if transfer.is_expiry_due(now) {
                self.pending
                    .transition_if(transfer.id, PendingState::Pending, PendingState::Expired, now)
                    .await?;
                transfer.state = PendingState::Expired;
            }
        }
        Ok(transfers)
    }

    async fn resolve_recipient(
        &self,
        address: &str,
        sender_user: UserId,
    ) -> Result<Account, FlowError> {
        let recipient = match self.ledger.account_by_address(address.trim()).await {
            Ok(account) => account,
            Err(LedgerError::AddressNotFound(_)) => return Err(FlowError::RecipientNotFound),
            Err(e) => return Err(e.into()),
        };
        if recipient.user_id == sender_user {
            return Err(FlowError::SelfTransfer);
        }
        Ok(recipient)
    }

    /// Re-resolve both parties after OTP verification. Addresses and account
    /// state may have changed since issuance; cached ids from the OTP payload
    /// are never trusted.
    async fn resolve_parties(
        &self,
        identity: &Identity,
        payload: &OtpPayload,
    ) -> Result<(Account, Account), FlowError> {
        let sender = self.ledger.account_by_user(identity.user_id).await?;
        if !sender.active {
            return Err(LedgerError::AccountFrozen(sender.id).into());
        }
        if sender.balance < payload.amount {
            return Err(LedgerError::InsufficientFunds.into());
        }
        if payload.amount > sender.daily_transfer_limit {
            return Err(FlowError::OverDailyLimit {
                limit: sender.daily_transfer_limit,
            });
        }
        let recipient = self
            .resolve_recipient(&payload.recipient_address, identity.user_id)
            .await?;
        Ok((sender, recipient))
    }

    async fn notify_committed(
        &self,
        sender_identity: &Identity,
        recipient: &Account,
        amount: Decimal,
        receipt: &TransferReceipt,
    ) {
        deliver(
            self.sink.as_ref(),
            &sender_identity.email,
            "TAU transfer sent",
            &format!(
                "{} TAU sent to {}. Your balance is now {}.",
                money::format_amount(amount),
                recipient.address,
                money::format_amount(receipt.sender_balance_after)
            ),
        )
        .await;
        deliver_to_user(
            self.sink.as_ref(),
            self.directory.as_ref(),
            recipient.user_id,
            "TAU transfer received",
            &format!(
                "{} TAU credited. Your balance is now {}.",
                money::format_amount(amount),
                money::format_amount(receipt.recipient_balance_after)
            ),
        )
        .await;
    }
}

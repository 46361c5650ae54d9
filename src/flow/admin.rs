//! Administrative adjustments.
//!
//! Privileged credit/debit and account freeze. Shares the Ledger Store's
//! atomic primitives and non-negativity invariant; every mutation also
//! appends an audit record, since administrative changes bypass user consent.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::audit::AuditLog;
use crate::core_types::{AccountId, Identity};
use crate::ledger::{EntryKind, LedgerStore};
use crate::money;
use crate::notify::{NotificationSink, UserDirectory, deliver_to_user};

use super::error::FlowError;

/// Direction of an administrative adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustDirection {
    Credit,
    Debit,
}

impl AdjustDirection {
    fn entry_kind(&self) -> EntryKind {
        match self {
            AdjustDirection::Credit => EntryKind::AdminCredit,
            AdjustDirection::Debit => EntryKind::AdminDebit,
        }
    }
}

pub struct AdminService {
    ledger: Arc<dyn LedgerStore>,
    audit: Arc<dyn AuditLog>,
    sink: Arc<dyn NotificationSink>,
    directory: Arc<dyn UserDirectory>,
}

impl AdminService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        audit: Arc<dyn AuditLog>,
        sink: Arc<dyn NotificationSink>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            ledger,
            audit,
            sink,
            directory,
        }
    }

    /// Credit or debit an account. A debit below zero fails with
    /// `InsufficientFunds` and applies nothing. Returns the new balance.
    pub async fn adjust_balance(
        &self,
        actor: &Identity,
        account_id: AccountId,
        amount: Decimal,
        direction: AdjustDirection,
        description: &str,
    ) -> Result<Decimal, FlowError> {
        let amount = money::validate_amount(amount)?;
        let tagged = format!("[ADMIN] {}", description);
        let new_balance = self
            .ledger
            .adjust(account_id, direction.entry_kind(), amount, &tagged)
            .await?;

        self.record_audit(
            actor,
            "balance_adjustment",
            &format!("wallet:{}", account_id),
            json!({
                "amount": money::format_amount(amount),
                "direction": direction,
                "description": description,
                "new_balance": money::format_amount(new_balance),
            }),
        )
        .await;

        info!(
            actor = actor.user_id,
            account_id,
            amount = %amount,
            ?direction,
            "Administrative balance adjustment"
        );
        Ok(new_balance)
    }

    /// Freeze or unfreeze an account. A frozen account rejects all transfer
    /// commits, incoming and outgoing.
    pub async fn set_account_active(
        &self,
        actor: &Identity,
        account_id: AccountId,
        active: bool,
        reason: Option<&str>,
    ) -> Result<(), FlowError> {
        self.ledger.set_active(account_id, active).await?;

        self.record_audit(
            actor,
            if active { "account_unfreeze" } else { "account_freeze" },
            &format!("wallet:{}", account_id),
            json!({ "active": active, "reason": reason }),
        )
        .await;

        if let Ok(account) = self.ledger.account(account_id).await {
            let subject = if active {
                "Your TAU wallet was reactivated"
            } else {
                "Your TAU wallet was frozen"
            };
            let body = match reason {
                Some(r) => format!("Reason: {}", r),
                None => "Contact support for details.".to_string(),
            };
            deliver_to_user(
                self.sink.as_ref(),
                self.directory.as_ref(),
                account.user_id,
                subject,
                &body,
            )
            .await;
        }
        Ok(())
    }

    /// Change an account's per-transfer cap. The new cap binds immediately,
    /// including accepts of offers created under the old cap.
    pub async fn set_daily_limit(
        &self,
        actor: &Identity,
        account_id: AccountId,
        limit: Decimal,
    ) -> Result<(), FlowError> {
        self.ledger.set_daily_limit(account_id, limit).await?;
        self.record_audit(
            actor,
            "limit_change",
            &format!("wallet:{}", account_id),
            json!({ "daily_transfer_limit": money::format_amount(limit) }),
        )
        .await;
        Ok(())
    }

    async fn record_audit(
        &self,
        actor: &Identity,
        action: &str,
        target: &str,
        detail: serde_json::Value,
    ) {
        if let Err(e) = self
            .audit
            .append(actor.user_id, action, target, detail)
            .await
        {
            // The mutation already committed; surface the gap loudly for ops.
            error!(actor = actor.user_id, action, target, error = %e, "AUDIT RECORD LOST");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::ledger::{LedgerError, MemoryLedger};
    use crate::notify::{MemoryDirectory, MemorySink};

    async fn setup() -> (AdminService, Arc<MemoryLedger>, Arc<MemoryAuditLog>, Arc<MemorySink>) {
        let ledger = Arc::new(MemoryLedger::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let sink = Arc::new(MemorySink::new());
        let directory = Arc::new(MemoryDirectory::new());
        directory.insert(1, "owner@tau.dev");
        let admin = AdminService::new(
            ledger.clone(),
            audit.clone(),
            sink.clone(),
            directory,
        );
        (admin, ledger, audit, sink)
    }

    fn root() -> Identity {
        Identity::new(999, "admin@tau.dev")
    }

    #[tokio::test]
    async fn test_adjust_writes_tagged_entry_and_audit() {
        let (admin, ledger, audit, _) = setup().await;
        let account = ledger
            .open_account(1, Decimal::from(500), Decimal::from(10))
            .await
            .unwrap();

        let new_balance = admin
            .adjust_balance(
                &root(),
                account.id,
                Decimal::from(5),
                AdjustDirection::Debit,
                "chargeback",
            )
            .await
            .unwrap();
        assert_eq!(new_balance, Decimal::from(5));

        let entries = ledger.entries(account.id, 10).await.unwrap();
        assert!(entries[0].description.as_deref().unwrap().starts_with("[ADMIN]"));

        let records = audit.recent(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "balance_adjustment");
        assert_eq!(records[0].actor_user, 999);
        assert_eq!(records[0].target, format!("wallet:{}", account.id));
        assert_eq!(records[0].detail["direction"], "debit");
    }

    #[tokio::test]
    async fn test_debit_below_zero_rejected() {
        let (admin, ledger, _, _) = setup().await;
        let account = ledger
            .open_account(1, Decimal::from(500), Decimal::from(10))
            .await
            .unwrap();

        let err = admin
            .adjust_balance(
                &root(),
                account.id,
                Decimal::from(11),
                AdjustDirection::Debit,
                "too much",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Ledger(LedgerError::InsufficientFunds)));
        assert_eq!(
            ledger.account(account.id).await.unwrap().balance,
            Decimal::from(10)
        );
    }

    #[tokio::test]
    async fn test_freeze_audits_and_notifies_owner() {
        let (admin, ledger, audit, sink) = setup().await;
        let account = ledger
            .open_account(1, Decimal::from(500), Decimal::ZERO)
            .await
            .unwrap();

        admin
            .set_account_active(&root(), account.id, false, Some("abuse report"))
            .await
            .unwrap();

        assert!(!ledger.account(account.id).await.unwrap().active);
        assert_eq!(audit.recent(10).await.unwrap()[0].action, "account_freeze");
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "owner@tau.dev");
        assert!(sent[0].body.contains("abuse report"));
    }
}

//! In-memory Ledger Store.
//!
//! Authoritative for dev/test mode and the reference implementation of the
//! store contract. Each account row lives behind its own mutex; two-account
//! operations always acquire the numerically-lower account id first, so two
//! transfers moving funds in opposite directions between the same pair of
//! accounts cannot deadlock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::core_types::{AccountId, UserId};

use super::account::{Account, generate_address};
use super::entry::{EntryKind, EntryStatus, LedgerEntry};
use super::error::LedgerError;
use super::store::{BalanceUpdate, LedgerStore, TransferExecution, TransferReceipt};

pub struct MemoryLedger {
    accounts: DashMap<AccountId, Arc<Mutex<Account>>>,
    by_user: DashMap<UserId, AccountId>,
    by_address: DashMap<String, AccountId>,
    entries: Mutex<Vec<LedgerEntry>>,
    /// Completed transfer receipts by reference id. Checked under the account
    /// row locks, so a retried reference can never double-apply.
    receipts: DashMap<String, TransferReceipt>,
    next_account_id: AtomicU64,
    next_entry_id: AtomicU64,
    events: broadcast::Sender<BalanceUpdate>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            accounts: DashMap::new(),
            by_user: DashMap::new(),
            by_address: DashMap::new(),
            entries: Mutex::new(Vec::new()),
            receipts: DashMap::new(),
            next_account_id: AtomicU64::new(1),
            next_entry_id: AtomicU64::new(1),
            events,
        }
    }

    /// Subscribe to post-commit balance pushes (read-side only).
    pub fn subscribe(&self) -> broadcast::Receiver<BalanceUpdate> {
        self.events.subscribe()
    }

    /// Sum of all balances. Test/diagnostic helper for the conservation
    /// property.
    pub fn total_supply(&self) -> Decimal {
        self.accounts
            .iter()
            .map(|entry| entry.value().lock().unwrap().balance)
            .sum()
    }

    fn row(&self, id: AccountId) -> Result<Arc<Mutex<Account>>, LedgerError> {
        self.accounts
            .get(&id)
            .map(|r| Arc::clone(r.value()))
            .ok_or(LedgerError::AccountNotFound(id))
    }

    fn next_entry_id(&self) -> u64 {
        self.next_entry_id.fetch_add(1, Ordering::SeqCst)
    }

    fn push_event(&self, account_id: AccountId, balance: Decimal) {
        // Receivers may not exist; that is fine, the push is advisory.
        let _ = self.events.send(BalanceUpdate {
            account_id,
            balance,
        });
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn open_account(
        &self,
        user_id: UserId,
        daily_transfer_limit: Decimal,
        welcome_bonus: Decimal,
    ) -> Result<Account, LedgerError> {
        if self.by_user.contains_key(&user_id) {
            return Err(LedgerError::WalletExists);
        }

        let id = self.next_account_id.fetch_add(1, Ordering::SeqCst);
        let mut address = generate_address();
        while self.by_address.contains_key(&address) {
            address = generate_address();
        }

        let now = Utc::now();
        let mut account = Account {
            id,
            user_id,
            address: address.clone(),
            balance: Decimal::ZERO,
            active: true,
            daily_transfer_limit,
            created_at: now,
            updated_at: now,
        };

        if welcome_bonus > Decimal::ZERO {
            account.balance = welcome_bonus;
            self.entries.lock().unwrap().push(LedgerEntry {
                id: self.next_entry_id(),
                account_id: id,
                kind: EntryKind::Earning,
                amount: welcome_bonus,
                balance_after: welcome_bonus,
                counterparty: None,
                description: Some("[WELCOME] Signup bonus".to_string()),
                reference_id: Some(format!("welcome_{}", id)),
                status: EntryStatus::Completed,
                created_at: now,
            });
        }

        let snapshot = account.clone();
        self.accounts.insert(id, Arc::new(Mutex::new(account)));
        self.by_user.insert(user_id, id);
        self.by_address.insert(address, id);

        info!(account_id = id, user_id, "Wallet opened");
        Ok(snapshot)
    }

    async fn account(&self, id: AccountId) -> Result<Account, LedgerError> {
        Ok(self.row(id)?.lock().unwrap().clone())
    }

    async fn account_by_user(&self, user_id: UserId) -> Result<Account, LedgerError> {
        let id = *self
            .by_user
            .get(&user_id)
            .ok_or(LedgerError::WalletNotFound)?;
        self.account(id).await
    }

    async fn account_by_address(&self, address: &str) -> Result<Account, LedgerError> {
        let id = *self
            .by_address
            .get(address)
            .ok_or_else(|| LedgerError::AddressNotFound(address.to_string()))?;
        self.account(id).await
    }

    async fn execute_transfer(
        &self,
        exec: &TransferExecution,
    ) -> Result<TransferReceipt, LedgerError> {
        if exec.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if exec.sender == exec.recipient {
            return Err(LedgerError::SameAccount);
        }

        let sender_row = self.row(exec.sender)?;
        let recipient_row = self.row(exec.recipient)?;

        // Deterministic lock order: lower account id first.
        let (first, second) = if exec.sender < exec.recipient {
            (&sender_row, &recipient_row)
        } else {
            (&recipient_row, &sender_row)
        };
        let guard_a = first.lock().unwrap();
        let guard_b = second.lock().unwrap();
        let (mut sender, mut recipient) = if exec.sender < exec.recipient {
            (guard_a, guard_b)
        } else {
            (guard_b, guard_a)
        };

        // Idempotent retry: the receipt map is consulted while holding both
        // row locks, so a concurrent duplicate serializes behind the first
        // commit and observes its receipt.
        if let Some(receipt) = self.receipts.get(&exec.reference_id) {
            debug!(reference_id = %exec.reference_id, "Duplicate reference, returning recorded receipt");
            return Ok(receipt.clone());
        }

        if !sender.active {
            return Err(LedgerError::AccountFrozen(sender.id));
        }
        if !recipient.active {
            return Err(LedgerError::AccountFrozen(recipient.id));
        }
        if sender.balance < exec.amount {
            return Err(LedgerError::InsufficientFunds);
        }

        let now = Utc::now();
        sender.balance -= exec.amount;
        recipient.balance += exec.amount;
        sender.updated_at = now;
        recipient.updated_at = now;

        {
            let mut entries = self.entries.lock().unwrap();
            entries.push(LedgerEntry {
                id: self.next_entry_id(),
                account_id: sender.id,
                kind: EntryKind::TransferOut,
                amount: exec.amount,
                balance_after: sender.balance,
                counterparty: Some(recipient.id),
                description: exec.description.clone(),
                reference_id: Some(exec.reference_id.clone()),
                status: EntryStatus::Completed,
                created_at: now,
            });
            entries.push(LedgerEntry {
                id: self.next_entry_id(),
                account_id: recipient.id,
                kind: EntryKind::TransferIn,
                amount: exec.amount,
                balance_after: recipient.balance,
                counterparty: Some(sender.id),
                description: exec.description.clone(),
                reference_id: Some(exec.reference_id.clone()),
                status: EntryStatus::Completed,
                created_at: now,
            });
        }

        let receipt = TransferReceipt {
            reference_id: exec.reference_id.clone(),
            sender_balance_after: sender.balance,
            recipient_balance_after: recipient.balance,
        };
        self.receipts
            .insert(exec.reference_id.clone(), receipt.clone());

        let (sender_id, sender_balance) = (sender.id, sender.balance);
        let (recipient_id, recipient_balance) = (recipient.id, recipient.balance);
        drop(sender);
        drop(recipient);

        self.push_event(sender_id, sender_balance);
        self.push_event(recipient_id, recipient_balance);

        info!(
            reference_id = %receipt.reference_id,
            sender = sender_id,
            recipient = recipient_id,
            amount = %exec.amount,
            "Transfer committed"
        );
        Ok(receipt)
    }

    async fn receipt(&self, reference_id: &str) -> Result<Option<TransferReceipt>, LedgerError> {
        Ok(self.receipts.get(reference_id).map(|r| r.clone()))
    }

    async fn adjust(
        &self,
        account_id: AccountId,
        kind: EntryKind,
        amount: Decimal,
        description: &str,
    ) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let row = self.row(account_id)?;
        let mut account = row.lock().unwrap();

        let new_balance = if kind.is_credit() {
            account.balance + amount
        } else {
            if account.balance < amount {
                return Err(LedgerError::InsufficientFunds);
            }
            account.balance - amount
        };

        let now = Utc::now();
        account.balance = new_balance;
        account.updated_at = now;

        self.entries.lock().unwrap().push(LedgerEntry {
            id: self.next_entry_id(),
            account_id,
            kind,
            amount,
            balance_after: new_balance,
            counterparty: None,
            description: Some(description.to_string()),
            reference_id: None,
            status: EntryStatus::Completed,
            created_at: now,
        });

        drop(account);
        self.push_event(account_id, new_balance);
        Ok(new_balance)
    }

    async fn set_active(&self, account_id: AccountId, active: bool) -> Result<(), LedgerError> {
        let row = self.row(account_id)?;
        let mut account = row.lock().unwrap();
        account.active = active;
        account.updated_at = Utc::now();
        info!(account_id, active, "Account active flag changed");
        Ok(())
    }

    async fn set_daily_limit(
        &self,
        account_id: AccountId,
        limit: Decimal,
    ) -> Result<(), LedgerError> {
        if limit < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let row = self.row(account_id)?;
        let mut account = row.lock().unwrap();
        account.daily_transfer_limit = limit;
        account.updated_at = Utc::now();
        info!(account_id, limit = %limit, "Transfer limit changed");
        Ok(())
    }

    async fn entries(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        // Verify the account exists so unknown ids surface as NotFound
        // rather than an empty history.
        self.row(account_id)?;
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .rev()
            .filter(|e| e.account_id == account_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

//! Ledger Store
//!
//! Durable account/entry state plus the atomic transfer primitive everything
//! else builds on.
//!
//! # Safety Invariants
//!
//! 1. **Atomic check-and-mutate**: balance preconditions are evaluated inside
//!    the same critical section (row lock / DB transaction) that applies the
//!    mutation. No read-then-write across round trips.
//! 2. **Ordered locking**: two-account operations lock the lower account id
//!    first, at every call site.
//! 3. **Idempotency**: `execute_transfer` retried with the same reference id
//!    returns the recorded receipt instead of double-applying.
//! 4. **Append-only entries**: ledger entries are never updated or deleted.

pub mod account;
pub mod entry;
pub mod error;
pub mod memory;
pub mod store;

pub use account::{ADDRESS_PREFIX, Account, generate_address};
pub use entry::{EntryKind, EntryStatus, LedgerEntry};
pub use error::LedgerError;
pub use memory::MemoryLedger;
pub use store::{BalanceUpdate, LedgerStore, TransferExecution, TransferReceipt};

//! TAU Ledger - access unit accounting and transfer service
//!
//! A wallet ledger for TAU (platform access units) with an OTP-gated,
//! two-phase transfer protocol built on one atomic balance primitive.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (UserId, OtpId, etc.)
//! - [`money`] - Amount validation and formatting
//! - [`ledger`] - Accounts, entries and the atomic transfer primitive
//! - [`otp`] - One-time code challenges gating transfers
//! - [`flow`] - Transfer orchestration and administrative operations
//! - [`notify`] - Outbound notification seam
//! - [`audit`] - Administrative audit log
//! - [`persistence`] - PostgreSQL backends for every storage seam
//! - [`gateway`] - HTTP API

// Core types - must be first!
pub mod core_types;

pub mod audit;
pub mod config;
pub mod flow;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod money;
pub mod notify;
pub mod otp;
pub mod persistence;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use core_types::{AccountId, Identity, OtpId, PendingTransferId, UserId};
pub use flow::{AdminService, PendingState, PendingTransfer, TransferOrchestrator};
pub use ledger::{
    Account, BalanceUpdate, EntryKind, LedgerEntry, LedgerError, LedgerStore, MemoryLedger,
    TransferReceipt,
};
pub use otp::OtpManager;

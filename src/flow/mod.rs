//! Transfer Orchestrator
//!
//! The protocol layer: drives a transfer through its states and calls the
//! Ledger Store's atomic primitive at the commit point.
//!
//! # State Machine (pending/accept flow)
//!
//! ```text
//! Requested → OtpPending → OtpVerified → PendingOffer → Accepted
//!                                             ↓
//!                                    Cancelled / Expired
//! ```
//!
//! The immediate-confirm flow is identical through OtpVerified, then commits
//! directly instead of creating an offer.
//!
//! # Safety Invariants
//!
//! 1. Verifying identity does not move money: a pending offer leaves the
//!    sender's balance untouched until acceptance.
//! 2. One terminal transition per offer, enforced by CAS on the state column.
//! 3. Only the recipient accepts; only the sender cancels.
//! 4. Expiry is lazy: any touch of an overdue offer transitions it to
//!    Expired before the requested action is evaluated.
//! 5. Accept commits with the offer's stable reference id, so retries after
//!    an ambiguous outcome are idempotent through the ledger.

pub mod admin;
pub mod error;
pub mod orchestrator;
pub mod pending;
pub mod state;

#[cfg(test)]
mod integration_tests;

pub use admin::{AdjustDirection, AdminService};
pub use error::FlowError;
pub use orchestrator::TransferOrchestrator;
pub use pending::{MemoryPendingStore, PendingStore, PendingTransfer};
pub use state::PendingState;

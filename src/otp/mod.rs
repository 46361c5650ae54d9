//! OTP Challenge Manager
//!
//! A transfer never commits without the sender proving control of their email
//! inbox. This module issues short-lived 6-digit challenges bound to one
//! proposed transfer, and validates/consumes them exactly once.
//!
//! # Safety Invariants
//!
//! 1. Single-use: a consumed challenge never validates again (replay fails
//!    with `AlreadyUsed` even with the correct code).
//! 2. Attempt ceiling: after 3 code mismatches the challenge is permanently
//!    unusable, correct code or not.
//! 3. Strict expiry: an expired challenge rejects a correct code.
//! 4. The attempt-increment-then-check sequence is atomic per challenge row.

pub mod challenge;
pub mod error;
pub mod manager;
pub mod store;

pub use challenge::{OtpChallenge, OtpPayload, generate_code};
pub use error::OtpError;
pub use manager::OtpManager;
pub use store::{MemoryOtpStore, OtpStore};

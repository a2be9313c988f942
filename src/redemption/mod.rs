//! Code redemption.
//!
//! # Data Flow
//! ```text
//! RedemptionRequest {code, walletAddress}
//!     → service.rs (validate, per-code lock, re-check)
//!     → transfer.rs (TokenTransfer: pay the fixed amount, wait for inclusion)
//!     → ledger (mark the code used, persist)
//!     → error.rs (uniform caller-facing messages)
//! ```

pub mod error;
pub mod service;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{RedeemError, FAILURE_MESSAGE, INVALID_CODE_MESSAGE};
pub use service::{RedemptionRequest, RedemptionService};
pub use transfer::{TokenTransfer, TransferError, TransferHandle};

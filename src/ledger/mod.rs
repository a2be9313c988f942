//! Single-use code ledger.
//!
//! # Data Flow
//! ```text
//! startup:
//!     store.load() ── Some ──→ CodeLedger
//!          │
//!         None → seed list (codes.txt) → all unused → store.save() → CodeLedger
//!
//! redemption:
//!     is_redeemable(code) ... transfer ... mark_used(code)
//!                                              → re-check + flip + store.save()
//! ```
//!
//! # Invariants
//! - A code never goes from used back to unused
//! - No code is created after startup
//! - Memory only advances once the durable write has succeeded

pub mod code_ledger;
pub mod store;

use std::path::PathBuf;
use thiserror::Error;

pub use code_ledger::{CodeLedger, LedgerStats};
pub use store::{CodeState, Codes, JsonFileStore, LedgerStore, MemoryStore};

/// Errors raised by the ledger and its stores.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Reading or writing durable storage failed.
    #[error("ledger storage I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted ledger exists but cannot be parsed.
    #[error("ledger file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the ledger failed.
    #[error("failed to encode ledger: {0}")]
    Encode(#[source] serde_json::Error),

    /// The code is not in the ledger.
    #[error("unknown code")]
    UnknownCode,

    /// The code was already consumed.
    #[error("code already used")]
    AlreadyUsed,
}

impl LedgerError {
    /// True for failures of the durable layer, as opposed to code lookups.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            LedgerError::Io { .. } | LedgerError::Corrupt { .. } | LedgerError::Encode(_)
        )
    }
}

//! Single-use invitation code redemption service.
//!
//! Each code in the ledger entitles its bearer to one fixed ERC-20 transfer.
//! A redemption validates the code, sends the tokens, and only then marks
//! the code used.

// Core subsystems
pub mod config;
pub mod http;
pub mod ledger;
pub mod redemption;

// Chain integration
pub mod blockchain;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::RedeemerConfig;
pub use http::HttpServer;
pub use ledger::CodeLedger;
pub use lifecycle::Shutdown;
pub use redemption::{RedemptionRequest, RedemptionService, TokenTransfer};

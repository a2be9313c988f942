//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! POST /redeem:
//!     → rate_limit.rs (per-IP token bucket)
//!     → auth.rs (AuthGate: open or bearer)
//!     → redemption handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input; the wallet address is taken as given

pub mod auth;
pub mod rate_limit;

pub use auth::{gate_from_config, AuthGate, BearerGate, Caller, OpenGate};
pub use rate_limit::RateLimiter;

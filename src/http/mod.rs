//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID for correlation)
//!     → security (rate limit, AuthGate) on /redeem only
//!     → redeem.rs (decode body, hand off to RedemptionService)
//!     → JSON response
//! ```

pub mod redeem;
pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, HttpServer};

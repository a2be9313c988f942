//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → RedeemerConfig (validated, immutable)
//!     → handed to startup, which builds every subsystem from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no hot reload, the ledger paths and
//!   signing setup must not change under a running redemption
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets (signer key) never live in the file; see `blockchain::wallet`

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, AuthConfig, AuthMode, BlockchainConfig, LedgerConfig, ListenerConfig,
    ObservabilityConfig, RedeemerConfig, RedemptionConfig, SecurityConfig, TimeoutConfig,
    TokenConfig,
};

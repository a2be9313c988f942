//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment variable (private key), config (RPC URL, token)
//!     → wallet.rs (key loading, signing, nonce)
//!     → client.rs (RPC connection with timeouts and failover)
//!     → transaction.rs (build, sign, broadcast, confirm)
//!     → token.rs (ERC-20 transfer of the fixed payout)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys, RPC URLs (only their host) or the contract address
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod token;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::BlockchainClient;
pub use token::Erc20Transfer;
pub use types::{BlockchainConfig, BlockchainError, ChainId};
pub use wallet::Wallet;

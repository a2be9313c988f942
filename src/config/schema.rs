//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the redeemer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the redemption service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RedeemerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Code ledger storage locations.
    pub ledger: LedgerConfig,

    /// Redemption concurrency settings.
    pub redemption: RedemptionConfig,

    /// Blockchain integration settings.
    pub blockchain: BlockchainConfig,

    /// Token paid out per redeemed code.
    pub token: TokenConfig,

    /// Authorization gate in front of the redemption endpoint.
    pub auth: AuthConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Timeout configuration for the HTTP layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    ///
    /// Expiry only abandons the response; an in-flight redemption still
    /// runs to completion.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 180 }
    }
}

/// Where the code ledger lives on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Durable JSON ledger (code -> {used}).
    pub ledger_path: String,

    /// Plain-text seed list, one code per line. Read only when the ledger
    /// file does not exist yet.
    pub seed_path: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ledger_path: "codes.json".to_string(),
            seed_path: "codes.txt".to_string(),
        }
    }
}

/// Redemption concurrency configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedemptionConfig {
    /// Maximum time to wait for another request holding the same code.
    /// Zero waits indefinitely.
    pub lock_timeout_secs: u64,
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: 30,
        }
    }
}

/// Blockchain integration configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 56 for BSC mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required before a transfer counts.
    pub confirmation_blocks: u32,

    /// Maximum time to wait for confirmations after broadcast, in seconds.
    pub confirmation_timeout_secs: u64,

    /// Gas price multiplier (1.0 = estimated, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price bid in gwei, after the multiplier.
    pub max_gas_price_gwei: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 56,
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            confirmation_timeout_secs: 120,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 50,
        }
    }
}

// RPC URLs routinely embed provider API keys.
impl std::fmt::Debug for BlockchainConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainConfig")
            .field("rpc_host", &redact_url(&self.rpc_url))
            .field("failover_count", &self.failover_urls.len())
            .field("chain_id", &self.chain_id)
            .field("rpc_timeout_secs", &self.rpc_timeout_secs)
            .field("confirmation_blocks", &self.confirmation_blocks)
            .field("confirmation_timeout_secs", &self.confirmation_timeout_secs)
            .field("gas_price_multiplier", &self.gas_price_multiplier)
            .field("max_gas_price_gwei", &self.max_gas_price_gwei)
            .finish()
    }
}

/// The token handed out for each redeemed code.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// ERC-20 contract address.
    pub contract_address: String,

    /// Human-readable amount per redemption (e.g. "1" or "0.5").
    pub amount: String,

    /// Token decimals used to scale `amount`.
    pub decimals: u8,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            contract_address: String::new(),
            amount: "1".to_string(),
            decimals: 18,
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("contract_address", &"<redacted>")
            .field("amount", &self.amount)
            .field("decimals", &self.decimals)
            .finish()
    }
}

/// How callers of the redemption endpoint are authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Every caller passes as anonymous.
    #[default]
    Open,
    /// Callers must present `Authorization: Bearer <token>`.
    Bearer,
}

/// Authorization gate configuration.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub bearer_token: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,

    /// Sustained redemption attempts allowed per client IP per minute.
    /// Zero disables rate limiting.
    pub rate_limit_per_minute: u32,

    /// Burst capacity per client IP.
    pub rate_limit_burst: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 16 * 1024,
            rate_limit_per_minute: 30,
            rate_limit_burst: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Placeholder admin key; validation refuses it when the admin API is on.
pub const DEFAULT_ADMIN_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: DEFAULT_ADMIN_KEY.to_string(),
            bind_address: "127.0.0.1:3001".to_string(),
        }
    }
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("enabled", &self.enabled)
            .field("bind_address", &self.bind_address)
            .finish_non_exhaustive()
    }
}

/// Reduce a URL to `scheme://host[:port]` for logging.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}://{}:{}", url.scheme(), host, port),
            (Some(host), None) => format!("{}://{}", url.scheme(), host),
            _ => "<redacted>".to_string(),
        },
        Err(_) => "<invalid url>".to_string(),
    }
}

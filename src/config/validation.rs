//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, URLs and value ranges
//! - Refuse placeholder secrets where they would be exposed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RedeemerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use std::net::SocketAddr;
use thiserror::Error;

use crate::blockchain::token::parse_amount;
use crate::config::schema::{AuthMode, RedeemerConfig, DEFAULT_ADMIN_KEY};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &RedeemerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            "must be a socket address like 0.0.0.0:3000",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    validate_ledger(config, &mut errors);
    validate_blockchain(config, &mut errors);
    validate_token(config, &mut errors);

    if config.auth.mode == AuthMode::Bearer && config.auth.bearer_token.trim().is_empty() {
        errors.push(ValidationError::new("auth.bearer_token", "required when auth.mode = \"bearer\""));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than zero"));
    }
    if config.security.rate_limit_per_minute > 0 && config.security.rate_limit_burst == 0 {
        errors.push(ValidationError::new(
            "security.rate_limit_burst",
            "must be at least 1 when rate limiting is enabled",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "must be a socket address"));
    }

    if config.admin.enabled {
        if config.admin.api_key.trim().is_empty() || config.admin.api_key == DEFAULT_ADMIN_KEY {
            errors.push(ValidationError::new("admin.api_key", "must be set to a non-default value"));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new("admin.bind_address", "must be a socket address"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_ledger(config: &RedeemerConfig, errors: &mut Vec<ValidationError>) {
    let ledger = &config.ledger;
    if ledger.ledger_path.trim().is_empty() {
        errors.push(ValidationError::new("ledger.ledger_path", "must not be empty"));
    }
    if ledger.seed_path.trim().is_empty() {
        errors.push(ValidationError::new("ledger.seed_path", "must not be empty"));
    }
    if ledger.ledger_path == ledger.seed_path {
        errors.push(ValidationError::new("ledger.seed_path", "must differ from ledger.ledger_path"));
    }
}

fn validate_blockchain(config: &RedeemerConfig, errors: &mut Vec<ValidationError>) {
    let chain = &config.blockchain;
    // Never echo the URL itself, it may carry an API key.
    if url::Url::parse(&chain.rpc_url).is_err() {
        errors.push(ValidationError::new("blockchain.rpc_url", "is not a valid URL"));
    }
    if chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.rpc_timeout_secs", "must be greater than zero"));
    }
    if chain.confirmation_blocks == 0 {
        errors.push(ValidationError::new("blockchain.confirmation_blocks", "must be at least 1"));
    }
    if chain.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "blockchain.confirmation_timeout_secs",
            "must be greater than zero",
        ));
    }
    if !(chain.gas_price_multiplier >= 1.0) {
        errors.push(ValidationError::new("blockchain.gas_price_multiplier", "must be >= 1.0"));
    }
    if chain.max_gas_price_gwei == 0 {
        errors.push(ValidationError::new("blockchain.max_gas_price_gwei", "must be greater than zero"));
    }
}

fn validate_token(config: &RedeemerConfig, errors: &mut Vec<ValidationError>) {
    let token = &config.token;
    match token.contract_address.parse::<Address>() {
        Ok(address) if address.is_zero() => {
            errors.push(ValidationError::new("token.contract_address", "must not be the zero address"));
        }
        Ok(_) => {}
        Err(_) => {
            errors.push(ValidationError::new("token.contract_address", "must be a 20-byte hex address"));
        }
    }
    if token.decimals > 77 {
        errors.push(ValidationError::new("token.decimals", "must be at most 77"));
    } else if let Err(e) = parse_amount(&token.amount, token.decimals) {
        errors.push(ValidationError::new("token.amount", e.to_string()));
    }
}

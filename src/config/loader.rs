//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::RedeemerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `blockchain.rpc_url`.
pub const RPC_URL_ENV_VAR: &str = "REDEEMER_RPC_URL";

/// Environment variable overriding `token.contract_address`.
pub const TOKEN_CONTRACT_ENV_VAR: &str = "REDEEMER_TOKEN_CONTRACT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RedeemerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: RedeemerConfig = toml::from_str(&content)?;
    finalize(config)
}

/// Apply environment overrides and validate.
///
/// Used directly when no config file is given.
pub fn finalize(mut config: RedeemerConfig) -> Result<RedeemerConfig, ConfigError> {
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay environment values on top of the file contents.
///
/// The lookup is injected so tests do not have to mutate the process
/// environment.
pub fn apply_env_overrides<F>(config: &mut RedeemerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(rpc_url) = lookup(RPC_URL_ENV_VAR).filter(|v| !v.trim().is_empty()) {
        config.blockchain.rpc_url = rpc_url.trim().to_string();
    }
    if let Some(contract) = lookup(TOKEN_CONTRACT_ENV_VAR).filter(|v| !v.trim().is_empty()) {
        config.token.contract_address = contract.trim().to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[listener]\nbind_address = \"127.0.0.1:4000\"\n\n[token]\ncontract_address = \"{}\"\n",
            CONTRACT
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:4000");
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[blockchain]\nconfirmation_blocks = 0\n").unwrap();

        let err = load_config(file.path()).unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert!(errors.len() >= 2),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RedeemerConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            RPC_URL_ENV_VAR => Some("https://rpc.example.org".to_string()),
            TOKEN_CONTRACT_ENV_VAR => Some(format!(" {} ", CONTRACT)),
            _ => None,
        });
        assert_eq!(config.blockchain.rpc_url, "https://rpc.example.org");
        assert_eq!(config.token.contract_address, CONTRACT);
    }

    #[test]
    fn test_blank_env_values_ignored() {
        let mut config = RedeemerConfig::default();
        apply_env_overrides(&mut config, |_| Some("   ".to_string()));
        assert_eq!(config.blockchain.rpc_url, "http://localhost:8545");
    }
}

//! code-redeemer
//!
//! Serves `POST /redeem`: trades a single-use invitation code for a fixed
//! ERC-20 transfer to the caller's wallet.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ http (rate limit, auth) ──▶ RedemptionService ──▶ TokenTransfer ──▶ chain
//!                                               │
//!                                               ▼
//!                                          CodeLedger ──▶ codes.json
//! ```

use std::path::PathBuf;

use clap::Parser;

use code_redeemer::config::{self, RedeemerConfig};
use code_redeemer::lifecycle;
use code_redeemer::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "code-redeemer")]
#[command(about = "Redeem single-use invitation codes for ERC-20 tokens", long_about = None)]
struct Cli {
    /// Path to the TOML config file. Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::loader::finalize(RedeemerConfig::default())?,
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "code-redeemer starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        ledger = %config.ledger.ledger_path,
        blockchain = ?config.blockchain,
        token = ?config.token,
        admin = ?config.admin,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    lifecycle::run(config).await?;
    Ok(())
}

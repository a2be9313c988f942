//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the code ledger (seeding it on first run)
//! - Load the signer and connect to the chain
//! - Start the redemption listener, and the admin listener when enabled
//! - Coordinate graceful shutdown of everything started here

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::{setup_admin_router, AdminState};
use crate::blockchain::{BlockchainClient, BlockchainError, Erc20Transfer, Wallet};
use crate::config::{LedgerConfig, RedeemerConfig};
use crate::http::HttpServer;
use crate::ledger::{CodeLedger, JsonFileStore, LedgerError};
use crate::lifecycle::shutdown::{drain_redemptions, Shutdown};
use crate::lifecycle::signals::spawn_signal_handler;
use crate::redemption::{RedemptionService, TokenTransfer};

/// How long shutdown waits for redemptions that already started.
const DRAIN_DEADLINE: Duration = Duration::from_secs(150);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),

    #[error("blockchain setup failed: {0}")]
    Blockchain(#[from] BlockchainError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Open the durable ledger, creating it from the seed list on first run.
pub fn open_ledger(config: &LedgerConfig) -> Result<CodeLedger, LedgerError> {
    let store = JsonFileStore::new(&config.ledger_path);
    CodeLedger::load(store, Path::new(&config.seed_path))
}

/// Build the on-chain payout client. The signer key comes from the
/// environment only.
pub async fn connect_transfer(config: &RedeemerConfig) -> Result<Erc20Transfer, BlockchainError> {
    let wallet = Wallet::from_env(config.blockchain.chain_id)?;
    let client = BlockchainClient::new(config.blockchain.clone()).await?;
    let transfer = Erc20Transfer::new(client, wallet.clone(), &config.token)?;

    tracing::info!(
        signer = %wallet.address(),
        chain_id = wallet.chain_id(),
        amount = %transfer.amount(),
        "Payout client ready"
    );
    Ok(transfer)
}

/// Start the service with the production ledger and transfer client and run
/// until a termination signal.
pub async fn run(config: RedeemerConfig) -> Result<(), StartupError> {
    let ledger = Arc::new(open_ledger(&config.ledger)?);
    let transfer: Arc<dyn TokenTransfer> = Arc::new(connect_transfer(&config).await?);

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_handler(shutdown.clone());

    serve(config, ledger, transfer, shutdown).await
}

/// Bind the listeners and serve until `shutdown` fires.
///
/// Split from [`run`] so tests can supply their own transfer client.
pub async fn serve(
    config: RedeemerConfig,
    ledger: Arc<CodeLedger>,
    transfer: Arc<dyn TokenTransfer>,
    shutdown: Arc<Shutdown>,
) -> Result<(), StartupError> {
    let service = Arc::new(RedemptionService::new(ledger, transfer, &config.redemption));

    let listener = bind(&config.listener.bind_address).await?;

    let admin = if config.admin.enabled {
        let admin_listener = bind(&config.admin.bind_address).await?;
        let router = setup_admin_router(AdminState::new(service.clone(), &config.admin));
        let mut rx = shutdown.subscribe();
        tracing::info!(address = %config.admin.bind_address, "Admin API starting");
        Some(tokio::spawn(async move {
            axum::serve(admin_listener, router)
                .with_graceful_shutdown(async move {
                    let _ = rx.recv().await;
                })
                .await
        }))
    } else {
        None
    };

    let server = HttpServer::new(config, service.clone());
    server.run(listener, shutdown.subscribe()).await?;

    if let Some(handle) = admin {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin API task panicked"),
        }
    }

    let pending = drain_redemptions(&service, DRAIN_DEADLINE).await;
    if pending > 0 {
        tracing::error!(
            pending = pending,
            "Exiting with redemptions still in flight; check logs for unconfirmed transfers"
        );
    }

    tracing::info!(ledger = ?service.ledger().stats(), "Shutdown complete");
    Ok(())
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

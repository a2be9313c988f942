//! Transaction building, signing, broadcasting and confirmation monitoring.
//!
//! # Responsibilities
//! - Build transactions with nonce, guarded gas price and estimated gas
//! - Sign locally and broadcast raw bytes
//! - Monitor confirmations
//!
//! # Design Decisions
//! - Build + broadcast run under one async lock so concurrent sends never
//!   share a nonce; confirmation waits run outside it
//! - Nothing here retries a broadcast, the caller owns retry policy

use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::types::{BlockchainError, BlockchainResult, ConfirmationStatus};
use crate::blockchain::wallet::Wallet;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Headroom added on top of `eth_estimateGas`, in percent.
const GAS_LIMIT_HEADROOM_PERCENT: u64 = 20;

/// Transaction builder and sender for the payout wallet.
#[derive(Clone)]
pub struct TxBuilder {
    client: BlockchainClient,
    wallet: Wallet,
    send_lock: Arc<Mutex<()>>,
    poll_interval: Duration,
}

impl TxBuilder {
    /// Create a new transaction builder.
    pub fn new(client: BlockchainClient, wallet: Wallet) -> Self {
        Self {
            client,
            wallet,
            send_lock: Arc::new(Mutex::new(())),
            poll_interval: Duration::from_secs(2),
        }
    }

    /// Override how often receipts are polled.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Gas price to bid: node estimate times the configured multiplier,
    /// refused outright above the configured ceiling.
    async fn gas_price(&self) -> BlockchainResult<u128> {
        let gas_price = self.client.get_gas_price().await?;
        let config = self.client.config();
        check_gas_price(gas_price, config.max_gas_price_gwei, config.gas_price_multiplier)
    }

    /// Build, sign and broadcast a call to `to` with `data`.
    ///
    /// Returns the hash once a node accepted the transaction. Failures before
    /// the broadcast give the nonce back.
    pub async fn send(&self, to: Address, data: Bytes) -> BlockchainResult<TxHash> {
        let _guard = self.send_lock.lock().await;

        let from = self.wallet.address();
        let chain_nonce = self.client.get_transaction_count(from).await?;
        self.wallet.sync_nonce(chain_nonce);
        let gas_price = self.gas_price().await?;

        let nonce = self.wallet.reserve_nonce();
        match self.sign_and_broadcast(from, to, data, nonce, gas_price).await {
            Ok(tx_hash) => {
                tracing::info!(tx_hash = %tx_hash, nonce = nonce, "Transaction broadcast");
                Ok(tx_hash)
            }
            Err(e) => {
                self.wallet.release_nonce(nonce);
                Err(e)
            }
        }
    }

    async fn sign_and_broadcast(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
        nonce: u64,
        gas_price: u128,
    ) -> BlockchainResult<TxHash> {
        let mut tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(data)
            .with_nonce(nonce)
            .with_gas_price(gas_price)
            .with_chain_id(self.wallet.chain_id());

        let estimated = self.client.estimate_gas(&tx).await?;
        tx.set_gas_limit(with_headroom(estimated));

        let envelope = tx
            .build(&self.wallet.network_wallet())
            .await
            .map_err(|e| BlockchainError::Wallet(format!("Signing failed: {}", e)))?;
        let tx_hash = *envelope.tx_hash();
        let raw = envelope.encoded_2718();

        self.client.send_raw_transaction(tx_hash, &raw).await?;
        Ok(tx_hash)
    }

    /// Wait for a transaction to be mined with the configured depth.
    ///
    /// # Arguments
    /// * `tx_hash` - Transaction hash to monitor
    /// * `timeout_secs` - Maximum time to wait for confirmation
    pub async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
        timeout_secs: u64,
    ) -> BlockchainResult<ConfirmationStatus> {
        let required_confirmations = self.client.confirmation_blocks();

        let result = timeout(Duration::from_secs(timeout_secs), async {
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                // Lookup errors are transient here; the deadline bounds the loop.
                let receipt = match self.client.get_transaction_receipt(tx_hash).await {
                    Ok(Some(r)) => r,
                    Ok(None) => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(tx_hash = %tx_hash, error = %e, "Receipt lookup failed");
                        continue;
                    }
                };

                let current_block = match self.client.get_block_number().await {
                    Ok(block) => block,
                    Err(e) => {
                        tracing::warn!(tx_hash = %tx_hash, error = %e, "Block number lookup failed");
                        continue;
                    }
                };
                let tx_block = receipt.block_number.unwrap_or(current_block);

                if !receipt.status() {
                    return ConfirmationStatus::Reverted {
                        block_number: tx_block,
                    };
                }

                let confirmations = confirmations(current_block, tx_block);
                if confirmations >= required_confirmations {
                    return ConfirmationStatus::Confirmed {
                        block_number: tx_block,
                    };
                }

                tracing::debug!(
                    tx_hash = %tx_hash,
                    confirmations = confirmations,
                    required = required_confirmations,
                    "Waiting for confirmations"
                );
            }
        })
        .await;

        result.map_err(|_| BlockchainError::ConfirmationTimeout {
            tx_hash,
            timeout_secs,
        })
    }

    /// Get the wallet address.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}

/// A mined transaction counts its own block as the first confirmation.
fn confirmations(current_block: u64, tx_block: u64) -> u32 {
    let depth = current_block.saturating_sub(tx_block).saturating_add(1);
    u32::try_from(depth).unwrap_or(u32::MAX)
}

fn with_headroom(estimated: u64) -> u64 {
    let padded = estimated as u128 * (100 + GAS_LIMIT_HEADROOM_PERCENT as u128) / 100;
    u64::try_from(padded).unwrap_or(u64::MAX)
}

/// The bid after the multiplier; the ceiling applies to the bid itself.
fn check_gas_price(gas_price: u128, max_gwei: u64, multiplier: f64) -> BlockchainResult<u128> {
    let bid = (gas_price as f64 * multiplier) as u128;
    if bid > max_gwei as u128 * WEI_PER_GWEI {
        return Err(BlockchainError::GasPriceTooHigh {
            current_gwei: u64::try_from(bid / WEI_PER_GWEI).unwrap_or(u64::MAX),
            max_gwei,
        });
    }
    Ok(bid)
}

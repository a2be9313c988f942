//! The token transfer boundary.
//!
//! A transfer is a slow, fallible network operation. Implementations must only
//! report success after the transfer is confirmed on chain, and must never
//! retry on their own.

use alloy::primitives::{Address, TxHash};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::blockchain::BlockchainError;

/// Proof of a confirmed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferHandle {
    pub tx_hash: TxHash,
    pub block_number: u64,
}

/// Why a transfer did not complete.
///
/// In every case the code stays redeemable. Variants that carry a hash refer
/// to a transaction that reached the network and should be reconciled by an
/// operator before the code is retried.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Nothing was broadcast, or the broadcast outcome is unknown.
    #[error("transfer not sent: {0}")]
    NotSent(#[from] BlockchainError),

    /// Mined but reverted.
    #[error("transfer {tx_hash} reverted in block {block_number}")]
    Reverted { tx_hash: TxHash, block_number: u64 },

    /// Broadcast but no confirmation observed before the deadline.
    #[error("transfer {tx_hash} unconfirmed: {reason}")]
    Unconfirmed { tx_hash: TxHash, reason: String },
}

impl TransferError {
    /// Hash of a transaction that may have reached the network.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            TransferError::NotSent(e) => e.tx_hash(),
            TransferError::Reverted { tx_hash, .. } | TransferError::Unconfirmed { tx_hash, .. } => {
                Some(*tx_hash)
            }
        }
    }
}

/// Moves the fixed payout amount to a recipient.
#[async_trait]
pub trait TokenTransfer: Send + Sync {
    /// Send the payout to `to` and wait for confirmation.
    async fn transfer(&self, to: Address) -> Result<TransferHandle, TransferError>;
}

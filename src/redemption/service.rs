//! The redemption state machine.
//!
//! ```text
//! START -> VALIDATING -> TRANSFERRING -> COMMITTING -> DONE
//!                |                          |
//!                v                          v
//!            REJECTED                   FAILED
//! ```
//!
//! # Concurrency
//! A per-code async mutex is held from the redeemable check through the
//! commit, so two requests for the same code never both reach the transfer.
//! Requests for different codes never contend, so a hung transfer only holds
//! up its own code. `CodeLedger::mark_used` re-checks the flag under the
//! ledger lock as a second line.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::Address;
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::Instrument;

use crate::config::RedemptionConfig;
use crate::ledger::{CodeLedger, LedgerError};
use crate::observability::metrics;
use crate::redemption::error::{RedeemError, Result};
use crate::redemption::transfer::{TokenTransfer, TransferHandle};

/// A caller's request to redeem `code` into `wallet_address`.
///
/// The address is taken on trust: nothing checks that the caller owns it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

impl RedemptionRequest {
    pub fn new(code: impl Into<String>, wallet_address: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            wallet_address: Some(wallet_address.into()),
        }
    }
}

/// Orchestrates ledger and transfer for each redemption.
pub struct RedemptionService {
    ledger: Arc<CodeLedger>,
    transfer: Arc<dyn TokenTransfer>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    lock_timeout: Option<Duration>,
}

impl RedemptionService {
    pub fn new(
        ledger: Arc<CodeLedger>,
        transfer: Arc<dyn TokenTransfer>,
        config: &RedemptionConfig,
    ) -> Self {
        let lock_timeout =
            (config.lock_timeout_secs > 0).then(|| Duration::from_secs(config.lock_timeout_secs));
        Self {
            ledger,
            transfer,
            locks: DashMap::new(),
            lock_timeout,
        }
    }

    /// Override the per-code lock wait. `None` waits indefinitely.
    pub fn with_lock_timeout(mut self, lock_timeout: Option<Duration>) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn ledger(&self) -> &Arc<CodeLedger> {
        &self.ledger
    }

    /// Codes with a redemption in flight or queued.
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }

    /// Run a redemption on its own task.
    ///
    /// Dropping the returned future (client gone, HTTP timeout) does not
    /// cancel the redemption, so a broadcast transfer is always followed by
    /// its commit.
    pub async fn redeem_detached(self: Arc<Self>, request: RedemptionRequest) -> Result<TransferHandle> {
        let task = tokio::spawn(
            async move { self.redeem(request).await }.instrument(tracing::Span::current()),
        );
        task.await
            .map_err(|e| RedeemError::Internal(e.to_string()))?
    }

    /// Redeem a code. At most one call per code ever returns `Ok`.
    pub async fn redeem(&self, request: RedemptionRequest) -> Result<TransferHandle> {
        let result = match validate(&request) {
            Ok((code, to)) => self.redeem_code(code, to).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => metrics::record_redemption("redeemed"),
            Err(e) => metrics::record_redemption(e.outcome()),
        }
        result
    }

    async fn redeem_code(&self, code: &str, to: Address) -> Result<TransferHandle> {
        // A used code never becomes redeemable again, so a negative answer
        // here is final and needs no lock.
        if !self.ledger.is_redeemable(code) {
            tracing::info!(code = %mask_code(code), "Rejected code");
            return Err(RedeemError::InvalidCode);
        }

        let entry = LockEntry::acquire(&self.locks, code);
        let Some(lock) = entry.lock.as_deref() else {
            return Err(RedeemError::Internal("code lock missing".to_string()));
        };
        self.redeem_locked(lock, code, to).await
    }

    async fn redeem_locked(&self, lock: &Mutex<()>, code: &str, to: Address) -> Result<TransferHandle> {
        let _guard = match self.lock_timeout {
            Some(limit) => timeout(limit, lock.lock()).await.map_err(|_| {
                tracing::warn!(code = %mask_code(code), "Timed out waiting for concurrent redemption");
                RedeemError::LockTimeout
            })?,
            None => lock.lock().await,
        };

        // VALIDATING, under the lock: a concurrent holder may have just
        // consumed the code.
        if !self.ledger.is_redeemable(code) {
            tracing::info!(code = %mask_code(code), "Rejected code");
            return Err(RedeemError::InvalidCode);
        }

        // TRANSFERRING
        tracing::info!(code = %mask_code(code), recipient = %to, "Starting transfer");
        let started = Instant::now();
        let transfer = self.transfer.transfer(to).await;
        metrics::record_transfer(started.elapsed(), transfer.is_ok());

        let handle = match transfer {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(
                    code = %mask_code(code),
                    recipient = %to,
                    tx_hash = ?e.tx_hash(),
                    error = %e,
                    "Transfer failed; code remains redeemable"
                );
                return Err(e.into());
            }
        };

        // COMMITTING
        match self.ledger.mark_used(code) {
            Ok(()) => {
                tracing::info!(
                    code = %mask_code(code),
                    recipient = %to,
                    tx_hash = %handle.tx_hash,
                    block_number = handle.block_number,
                    "Code redeemed"
                );
                Ok(handle)
            }
            Err(LedgerError::AlreadyUsed) => {
                tracing::error!(
                    code = %mask_code(code),
                    recipient = %to,
                    tx_hash = %handle.tx_hash,
                    "Code consumed concurrently after transfer; payout duplicated"
                );
                Err(RedeemError::AlreadyRedeemed {
                    tx_hash: handle.tx_hash,
                })
            }
            Err(source) => {
                metrics::record_inconsistent_commit();
                tracing::error!(
                    alert = true,
                    code = %mask_code(code),
                    recipient = %to,
                    tx_hash = %handle.tx_hash,
                    error = %source,
                    "Tokens sent but code could not be marked used; ledger needs repair"
                );
                Err(RedeemError::CommitFailed { handle, source })
            }
        }
    }
}

impl std::fmt::Debug for RedemptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedemptionService")
            .field("ledger", &self.ledger)
            .field("in_flight", &self.locks.len())
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

/// A handle on one code's lock-map entry.
///
/// Dropping it removes the entry once nobody else holds or waits on it, also
/// when the redemption future is cancelled mid-flight.
struct LockEntry<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    code: &'a str,
    /// Only `None` while dropping.
    lock: Option<Arc<Mutex<()>>>,
}

impl<'a> LockEntry<'a> {
    fn acquire(locks: &'a DashMap<String, Arc<Mutex<()>>>, code: &'a str) -> Self {
        let lock = locks.entry(code.to_string()).or_default().clone();
        Self {
            locks,
            code,
            lock: Some(lock),
        }
    }
}

impl Drop for LockEntry<'_> {
    fn drop(&mut self) {
        drop(self.lock.take());
        // The count check and removal are atomic per shard.
        self.locks.remove_if(self.code, |_, m| Arc::strong_count(m) == 1);
    }
}

/// Reject malformed input before touching the ledger.
fn validate(request: &RedemptionRequest) -> Result<(&str, Address)> {
    let code = request
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(RedeemError::InvalidCode)?;
    let to: Address = request
        .wallet_address
        .as_deref()
        .map(str::trim)
        .and_then(|a| a.parse().ok())
        .ok_or(RedeemError::InvalidCode)?;
    if to.is_zero() {
        return Err(RedeemError::InvalidCode);
    }
    Ok((code, to))
}

/// Codes are bearer secrets; logs only get a prefix.
fn mask_code(code: &str) -> String {
    let prefix: String = code.chars().take(3).collect();
    format!("{}***", prefix)
}

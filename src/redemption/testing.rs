//! In-memory transfer fakes shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, TxHash};
use async_trait::async_trait;

use crate::blockchain::BlockchainError;
use crate::redemption::transfer::{TokenTransfer, TransferError, TransferHandle};

/// Recipient for which [`FakeTransfer`] never returns.
pub fn hanging_recipient() -> Address {
    Address::repeat_byte(0xee)
}

/// Scriptable transfer: succeeds or fails, optionally after a delay.
#[derive(Debug, Default)]
pub struct FakeTransfer {
    fail: AtomicBool,
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeTransfer {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let fake = Self::default();
        fake.set_failing(true);
        fake
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenTransfer for FakeTransfer {
    async fn transfer(&self, to: Address) -> Result<TransferHandle, TransferError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if to == hanging_recipient() {
            std::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransferError::NotSent(BlockchainError::Rpc(
                "injected transfer failure".to_string(),
            )));
        }
        Ok(TransferHandle {
            tx_hash: TxHash::with_last_byte(call as u8 + 1),
            block_number: 100 + call as u64,
        })
    }
}

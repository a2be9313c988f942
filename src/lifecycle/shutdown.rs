//! Shutdown coordination.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::redemption::RedemptionService;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait until no redemption is in flight, or `deadline` passes.
///
/// Returns the number still running when giving up.
pub async fn drain_redemptions(service: &RedemptionService, deadline: Duration) -> usize {
    let wait = async {
        while service.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    match tokio::time::timeout(deadline, wait).await {
        Ok(()) => 0,
        Err(_) => service.in_flight(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::RedemptionConfig;
    use crate::ledger::{CodeLedger, CodeState, Codes, MemoryStore};
    use crate::redemption::testing::FakeTransfer;
    use crate::redemption::RedemptionRequest;

    #[tokio::test]
    async fn test_trigger_reaches_subscribers() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();

        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_drain_waits_for_redemption() {
        let mut codes = Codes::new();
        codes.insert("ABC123".to_string(), CodeState::default());
        let ledger = Arc::new(CodeLedger::new(MemoryStore::new(), codes));
        let transfer = Arc::new(FakeTransfer::succeeding().with_delay(Duration::from_millis(100)));
        let service = Arc::new(RedemptionService::new(
            ledger.clone(),
            transfer,
            &RedemptionConfig::default(),
        ));

        let task = tokio::spawn(service.clone().redeem_detached(RedemptionRequest::new(
            "ABC123",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
        )));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(drain_redemptions(&service, Duration::from_secs(5)).await, 0);
        assert!(!ledger.is_redeemable("ABC123"));
        task.await.unwrap().unwrap();
    }
}

//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, TxHash};
use async_trait::async_trait;
use tokio::net::TcpListener;

use code_redeemer::blockchain::BlockchainError;
use code_redeemer::config::RedeemerConfig;
use code_redeemer::ledger::{CodeLedger, CodeState, Codes, JsonFileStore};
use code_redeemer::redemption::{TokenTransfer, TransferError, TransferHandle};
use code_redeemer::{HttpServer, RedemptionService, Shutdown};

pub const WALLET: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

/// Transfer double that records recipients instead of touching a chain.
#[derive(Default)]
pub struct RecordingTransfer {
    pub fail: AtomicBool,
    calls: AtomicUsize,
    recipients: std::sync::Mutex<Vec<Address>>,
    delay: Duration,
}

impl RecordingTransfer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recipients(&self) -> Vec<Address> {
        self.recipients.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenTransfer for RecordingTransfer {
    async fn transfer(&self, to: Address) -> Result<TransferHandle, TransferError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransferError::NotSent(BlockchainError::Rpc(
                "node unreachable".to_string(),
            )));
        }
        self.recipients.lock().unwrap().push(to);
        Ok(TransferHandle {
            tx_hash: TxHash::with_last_byte(call as u8 + 1),
            block_number: 1_000 + call as u64,
        })
    }
}

/// Ledger backed by a real JSON file inside `dir`.
pub fn file_ledger(dir: &std::path::Path, entries: &[&str]) -> Arc<CodeLedger> {
    let codes: Codes = entries
        .iter()
        .map(|c| (c.to_string(), CodeState::default()))
        .collect();
    let store = JsonFileStore::new(dir.join("codes.json"));
    Arc::new(CodeLedger::new(store, codes))
}

/// Start the redemption server on an ephemeral port.
pub async fn start_server(
    config: RedeemerConfig,
    ledger: Arc<CodeLedger>,
    transfer: Arc<dyn TokenTransfer>,
) -> (SocketAddr, Arc<Shutdown>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let service = Arc::new(RedemptionService::new(ledger, transfer, &config.redemption));
    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(config, service);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (addr, shutdown)
}

/// Poll until `addr` accepts connections.
pub async fn wait_for_listener(addr: SocketAddr) {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server at {} never came up", addr);
}

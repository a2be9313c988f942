//! ERC-20 payout transfers.

use alloy::primitives::utils::parse_units;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::transaction::TxBuilder;
use crate::blockchain::types::{BlockchainError, BlockchainResult, ConfirmationStatus};
use crate::blockchain::wallet::Wallet;
use crate::config::TokenConfig;
use crate::redemption::transfer::{TokenTransfer, TransferError, TransferHandle};

sol! {
    /// Minimal ERC-20 surface used for payouts.
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// Scale a human-readable amount by `decimals` (e.g. "1" with 18 decimals).
pub fn parse_amount(amount: &str, decimals: u8) -> BlockchainResult<U256> {
    let value: U256 = parse_units(amount.trim(), decimals)
        .map_err(|e| BlockchainError::InvalidToken(format!("invalid amount {:?}: {}", amount, e)))?
        .get_absolute();
    if value.is_zero() {
        return Err(BlockchainError::InvalidToken("amount must be greater than zero".to_string()));
    }
    Ok(value)
}

/// ABI-encoded `transfer(to, amount)` call data.
pub fn transfer_calldata(to: Address, amount: U256) -> Bytes {
    IERC20::transferCall { to, amount }.abi_encode().into()
}

/// Pays a fixed amount of one ERC-20 token per call.
#[derive(Clone)]
pub struct Erc20Transfer {
    tx: TxBuilder,
    contract: Address,
    amount: U256,
    confirmation_timeout_secs: u64,
}

impl Erc20Transfer {
    /// Build the payout client from validated configuration.
    pub fn new(client: BlockchainClient, wallet: Wallet, token: &TokenConfig) -> BlockchainResult<Self> {
        let contract: Address = token
            .contract_address
            .parse()
            .map_err(|_| BlockchainError::InvalidToken("contract address is not a valid address".to_string()))?;
        let amount = parse_amount(&token.amount, token.decimals)?;
        let confirmation_timeout_secs = client.config().confirmation_timeout_secs;

        Ok(Self {
            tx: TxBuilder::new(client, wallet),
            contract,
            amount,
            confirmation_timeout_secs,
        })
    }

    /// Amount sent per transfer, in base units.
    pub fn amount(&self) -> U256 {
        self.amount
    }
}

#[async_trait]
impl TokenTransfer for Erc20Transfer {
    async fn transfer(&self, to: Address) -> Result<TransferHandle, TransferError> {
        let tx_hash = self
            .tx
            .send(self.contract, transfer_calldata(to, self.amount))
            .await?;

        match self
            .tx
            .wait_for_confirmation(tx_hash, self.confirmation_timeout_secs)
            .await
        {
            Ok(ConfirmationStatus::Confirmed { block_number }) => {
                tracing::info!(tx_hash = %tx_hash, block_number = block_number, "Token transfer confirmed");
                Ok(TransferHandle { tx_hash, block_number })
            }
            Ok(ConfirmationStatus::Reverted { block_number }) => {
                tracing::warn!(tx_hash = %tx_hash, block_number = block_number, "Token transfer reverted");
                Err(TransferError::Reverted { tx_hash, block_number })
            }
            Err(e) => Err(TransferError::Unconfirmed {
                tx_hash,
                reason: e.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for Erc20Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Erc20Transfer")
            .field("from", &self.tx.address())
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(
            parse_amount("1", 18).unwrap(),
            U256::from(1_000_000_000_000_000_000u128)
        );
        assert_eq!(parse_amount("0.5", 6).unwrap(), U256::from(500_000u64));
        assert_eq!(parse_amount(" 2 ", 0).unwrap(), U256::from(2u64));
    }

    #[test]
    fn test_parse_amount_rejects_bad_values() {
        assert!(parse_amount("0", 18).is_err());
        assert!(parse_amount("abc", 18).is_err());
        assert!(parse_amount("", 18).is_err());
    }

    #[test]
    fn test_transfer_calldata() {
        let to = Address::repeat_byte(0x11);
        let data = transfer_calldata(to, U256::from(1u64));

        // selector(4) + address word(32) + amount word(32)
        assert_eq!(data.len(), 68);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(&data[16..36], to.as_slice());
        assert_eq!(data[67], 1);
    }

    #[test]
    fn test_new_rejects_bad_contract() {
        let client = BlockchainClient::connect(Default::default()).unwrap();
        let wallet = Wallet::from_private_key(
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            56,
        )
        .unwrap();
        let token = TokenConfig {
            contract_address: "nope".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Erc20Transfer::new(client, wallet, &token),
            Err(BlockchainError::InvalidToken(_))
        ));
    }
}

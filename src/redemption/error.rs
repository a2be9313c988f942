//! Redemption errors and their HTTP mapping.

use alloy::primitives::TxHash;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::redemption::transfer::{TransferError, TransferHandle};

/// Body for codes that cannot be redeemed. Unknown and used codes share it.
pub const INVALID_CODE_MESSAGE: &str = "Invalid or already redeemed code.";

/// Body for every server-side failure.
pub const FAILURE_MESSAGE: &str = "Failed to redeem code.";

pub type Result<T> = std::result::Result<T, RedeemError>;

#[derive(Debug, Error)]
pub enum RedeemError {
    /// Unknown code, used code, or malformed request.
    #[error("invalid or already redeemed code")]
    InvalidCode,

    /// Another request committed the code after this one's transfer went out.
    #[error("code was redeemed concurrently after transfer {tx_hash} was sent")]
    AlreadyRedeemed { tx_hash: TxHash },

    /// Waiting for another in-flight redemption of the same code took too long.
    #[error("timed out waiting for a concurrent redemption of the same code")]
    LockTimeout,

    /// The transfer failed; the code is still redeemable.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Tokens were sent but the ledger could not record it.
    #[error("transfer {} confirmed but ledger commit failed: {source}", .handle.tx_hash)]
    CommitFailed {
        handle: TransferHandle,
        #[source]
        source: LedgerError,
    },

    /// The redemption task itself died.
    #[error("redemption task failed: {0}")]
    Internal(String),
}

impl RedeemError {
    /// Metric label for this outcome.
    pub fn outcome(&self) -> &'static str {
        match self {
            RedeemError::InvalidCode => "invalid_code",
            RedeemError::AlreadyRedeemed { .. } => "already_redeemed",
            RedeemError::LockTimeout => "lock_timeout",
            RedeemError::Transfer(_) => "transfer_failed",
            RedeemError::CommitFailed { .. } => "commit_failed",
            RedeemError::Internal(_) => "internal",
        }
    }

    /// HTTP status reported to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            RedeemError::InvalidCode | RedeemError::AlreadyRedeemed { .. } => StatusCode::BAD_REQUEST,
            RedeemError::LockTimeout
            | RedeemError::Transfer(_)
            | RedeemError::CommitFailed { .. }
            | RedeemError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RedeemError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Details stay in the logs; callers only learn which side failed.
        let message = if status.is_client_error() {
            INVALID_CODE_MESSAGE
        } else {
            FAILURE_MESSAGE
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::BlockchainError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(RedeemError::InvalidCode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RedeemError::AlreadyRedeemed { tx_hash: TxHash::ZERO }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(RedeemError::LockTimeout.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let transfer = TransferError::NotSent(BlockchainError::Rpc("down".to_string()));
        assert_eq!(RedeemError::from(transfer).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_commit_failure_is_distinct() {
        let err = RedeemError::CommitFailed {
            handle: TransferHandle {
                tx_hash: TxHash::repeat_byte(0x42),
                block_number: 7,
            },
            source: LedgerError::Io {
                path: "codes.json".into(),
                source: std::io::Error::other("disk full"),
            },
        };
        assert_eq!(err.outcome(), "commit_failed");
        assert!(err.to_string().contains("ledger commit failed"));
        assert!(err.to_string().contains("0x4242"));
    }
}

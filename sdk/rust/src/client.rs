use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    pub code: String,
    pub wallet_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBody {
    message: String,
    #[serde(default)]
    tx_hash: Option<String>,
}

/// What the service said about a redemption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// Tokens sent; `tx_hash` is the payout transaction.
    Redeemed { message: String, tx_hash: String },
    /// 400: unknown, used, or malformed. The code was not consumed by this call.
    Rejected { message: String },
    /// 401 or 429: the request never reached the ledger.
    Refused { status: u16 },
    /// 5xx: the transfer or ledger write failed.
    Failed { status: u16, message: String },
}

impl RedeemOutcome {
    pub fn is_redeemed(&self) -> bool {
        matches!(self, RedeemOutcome::Redeemed { .. })
    }
}

pub struct RedeemClient {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl RedeemClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every redemption.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Redeem `code` into `wallet_address`.
    pub async fn redeem(
        &self,
        code: &str,
        wallet_address: &str,
    ) -> Result<RedeemOutcome, Box<dyn std::error::Error + Send + Sync>> {
        let mut request = self
            .client
            .post(format!("{}/redeem", self.base_url))
            .json(&RedeemRequest {
                code: code.to_string(),
                wallet_address: wallet_address.to_string(),
            });
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(RedeemOutcome::Refused { status: status.as_u16() });
        }

        let text = resp.text().await?;
        let body: ResponseBody = serde_json::from_str(&text)
            .map_err(|e| format!("Unexpected response {}: {} ({})", status, text, e))?;

        Ok(match status {
            StatusCode::OK => RedeemOutcome::Redeemed {
                message: body.message,
                tx_hash: body
                    .tx_hash
                    .ok_or_else(|| format!("Success response without txHash: {}", text))?,
            },
            s if s.is_client_error() => RedeemOutcome::Rejected { message: body.message },
            s => RedeemOutcome::Failed {
                status: s.as_u16(),
                message: body.message,
            },
        })
    }

    /// `true` if the service answers its health check.
    pub async fn health(&self) -> Result<bool, reqwest::Error> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }
}

//! Redemption and health handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::redemption::{RedeemError, RedemptionRequest};

pub const SUCCESS_MESSAGE: &str = "Code redeemed successfully. Check your wallet!";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResponse {
    pub message: &'static str,
    pub tx_hash: String,
}

/// `POST /redeem`
pub async fn redeem(
    State(state): State<AppState>,
    payload: Result<Json<RedemptionRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return rejection.into_response();
        }
        Err(rejection) => {
            // Unparseable bodies look the same to the caller as a bad code.
            tracing::debug!(error = %rejection, "Malformed redemption request");
            let err = RedeemError::InvalidCode;
            metrics::record_redemption(err.outcome());
            return err.into_response();
        }
    };

    match state.service.clone().redeem_detached(request).await {
        Ok(handle) => (
            StatusCode::OK,
            Json(RedeemResponse {
                message: SUCCESS_MESSAGE,
                tx_hash: handle.tx_hash.to_string(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::ledger::LedgerStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    /// Codes with a redemption currently running or queued.
    pub in_flight: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        in_flight: state.service.in_flight(),
    })
}

pub async fn get_ledger(State(state): State<AdminState>) -> Json<LedgerStats> {
    Json(state.service.ledger().stats())
}

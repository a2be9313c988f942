//! Admin API, served on its own listener.
//!
//! Read-only: operators can see service status and ledger counts, never the
//! codes themselves.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::{get_ledger, get_status};
use crate::config::AdminConfig;
use crate::redemption::RedemptionService;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub service: Arc<RedemptionService>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(service: Arc<RedemptionService>, config: &AdminConfig) -> Self {
        Self {
            service,
            api_key: Arc::from(config.api_key.as_str()),
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/ledger", get(get_ledger))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

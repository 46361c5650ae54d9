//! HTTP gateway.
//!
//! Routes, shared state and the serving loop. Authentication happens at the
//! edge proxy; the gateway reads the injected identity headers.

pub mod handlers;
pub mod identity;
pub mod state;
pub mod types;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

pub use state::AppState;
use types::{ApiResult, ok};

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub timestamp_ms: u64,
}

/// GET /api/v1/health
async fn health_check(State(_state): State<Arc<AppState>>) -> ApiResult<HealthData> {
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    ok(HealthData { timestamp_ms })
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_check))
        .route("/api/v1/wallet", post(handlers::open_wallet).get(handlers::get_wallet))
        .route("/api/v1/wallet/history", get(handlers::wallet_history))
        .route("/api/v1/transfer/initiate", post(handlers::initiate_transfer))
        .route("/api/v1/transfer/verify", post(handlers::verify_transfer))
        .route("/api/v1/transfer/commit", post(handlers::commit_transfer))
        .route(
            "/api/v1/transfer/pending/{id}/accept",
            post(handlers::accept_pending),
        )
        .route(
            "/api/v1/transfer/pending/{id}/cancel",
            post(handlers::cancel_pending),
        )
        .route("/api/v1/transfer/incoming", get(handlers::list_incoming))
        .route("/api/v1/transfer/outgoing", get(handlers::list_outgoing))
        .route("/api/v1/admin/earning", post(handlers::credit_earning))
        .route("/api/v1/admin/adjust", post(handlers::admin_adjust))
        .route(
            "/api/v1/admin/account/{id}/active",
            post(handlers::admin_set_active),
        )
        .route(
            "/api/v1/admin/account/{id}/limit",
            post(handlers::admin_set_limit),
        )
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Gateway listening on {}", addr);
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

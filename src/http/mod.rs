//! JSON API over the ledger service.
//!
//! ## Endpoints (all under `/api`)
//!
//! - `GET|POST|PUT|DELETE /clients`
//! - `GET|POST|DELETE /coin-transactions`
//! - `GET|POST|DELETE /debt-transactions`
//! - `GET|POST|PUT|DELETE /sales`, `GET|POST|PUT|DELETE /expenses`
//!   (POST takes one item or an array)
//! - `POST /sale` - point-of-sale registration by phone
//! - `GET /analytics`
//! - `GET /integrity`, `POST /integrity/rebuild`
//!
//! ```bash
//! curl -X POST http://localhost:3000/api/debt-transactions \
//!   -H "Content-Type: application/json" \
//!   -d '{"client_id": 1, "client_name": "Ana", "amount": "1500", "transaction_type": "payment"}'
//! ```

mod dto;
mod error;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::info;

use crate::application::LedgerService;

pub use error::{ApiError, ErrorResponse};

/// Shared application state containing the ledger service.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LedgerService>,
}

pub fn create_router(service: Arc<LedgerService>) -> Router {
    let api = Router::new()
        .route(
            "/clients",
            get(handlers::get_clients)
                .post(handlers::create_client)
                .put(handlers::update_client)
                .delete(handlers::delete_client),
        )
        .route(
            "/coin-transactions",
            get(handlers::list_coin_transactions)
                .post(handlers::post_coin_transaction)
                .delete(handlers::reverse_coin_transaction),
        )
        .route(
            "/debt-transactions",
            get(handlers::list_debt_transactions)
                .post(handlers::post_debt_transaction)
                .delete(handlers::reverse_debt_transaction),
        )
        .route(
            "/sales",
            get(handlers::list_sales)
                .post(handlers::record_sales)
                .put(handlers::update_sale)
                .delete(handlers::delete_sale),
        )
        .route(
            "/expenses",
            get(handlers::list_expenses)
                .post(handlers::record_expenses)
                .put(handlers::update_expense)
                .delete(handlers::delete_expense),
        )
        .route("/sale", post(handlers::register_pos_sale))
        .route("/analytics", get(handlers::analytics))
        .route("/integrity", get(handlers::check_integrity))
        .route("/integrity/rebuild", post(handlers::rebuild_balances));

    Router::new()
        .nest("/api", api)
        .with_state(AppState { service })
}

/// Serve the API until Ctrl-C.
pub async fn serve(service: Arc<LedgerService>, bind: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(address = %bind, "Ledger API listening");

    axum::serve(listener, create_router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Ledger API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed.
        std::future::pending::<()>().await;
    }
}

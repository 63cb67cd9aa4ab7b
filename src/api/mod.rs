//! HTTP API over the bank service.
//!
//! Routes:
//! - `GET /health`
//! - `GET /api/Transaction/GetLast{N}MonthBalances/{accountId}` (also `Last{N}MonthBalances`)
//! - `GET /api/Account/{accountId}`
//! - `GET /api/Account/{accountId}/transactions`

mod error;
mod handlers;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::application::BankService;
use crate::config::ServerConfig;
use crate::storage::LedgerStore;

pub use error::ErrorBody;
pub use handlers::parse_month_balances_endpoint;

/// Shared state handed to every handler.
pub struct AppState<S> {
    pub service: Arc<BankService<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

/// CORS policy allowing the given origins with any method and header.
pub fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin: {}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Build the application router.
pub fn router<S: LedgerStore>(
    service: Arc<BankService<S>>,
    allowed_origins: &[String],
) -> Result<Router> {
    let state = AppState { service };

    let api = Router::new()
        .route(
            "/Transaction/{endpoint}/{account_id}",
            get(handlers::month_balances::<S>),
        )
        .route("/Account/{account_id}", get(handlers::get_account::<S>))
        .route(
            "/Account/{account_id}/transactions",
            get(handlers::list_transactions::<S>),
        );

    Ok(Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .with_state(state)
        .layer(cors_layer(allowed_origins)?)
        .layer(TraceLayer::new_for_http()))
}

/// Serve `app` on an already bound listener until `shutdown` resolves.
pub async fn run(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    info!(address = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

/// Bind to the configured address and serve until Ctrl-C.
pub async fn serve<S: LedgerStore>(service: BankService<S>, config: &ServerConfig) -> Result<()> {
    let app = router(Arc::new(service), &config.allowed_origins)?;
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    run(listener, app, shutdown_signal()).await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}

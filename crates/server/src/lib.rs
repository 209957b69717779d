//! `bovinext-server`: the HTTP API.
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /health` | liveness + version |
//! | `POST /provision` | ensure user + wallet for the bearer token |
//! | `POST /vendas/simular` | settlement for registered animals |
//! | `GET /vendas/animais/prontos` | animals ready for sale |
//! | `POST /vendas/frigorifico/cotacao` | packer quote |
//! | `GET /rebanho`, `POST /rebanho`, `GET /rebanho/:id` | herd registry |
//! | `GET /rebanho/stats/overview` | herd totals |
//! | `GET /wallet/:address/balance` | reconciled balance |
//! | `POST /wallet/transfer` | transfer from the caller's wallet |
//! | `GET /wallet/:address/transactions` | paged history |

use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use bovinext_config::LogFormat;

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use routes::*;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/provision", post(provision_handler))
        .route("/vendas/simular", post(simulate_handler))
        .route("/vendas/animais/prontos", get(ready_handler))
        .route("/vendas/frigorifico/cotacao", post(quote_handler))
        .route("/rebanho", get(list_animals_handler).post(create_animal_handler))
        .route("/rebanho/stats/overview", get(overview_handler))
        .route("/rebanho/:id", get(get_animal_handler))
        .route("/wallet/transfer", post(transfer_handler))
        .route("/wallet/:address/balance", get(balance_handler))
        .route("/wallet/:address/transactions", get(transactions_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
/// Calling twice is harmless; the second call is ignored.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter);
    let installed = match format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        warn!("tracing subscriber already installed");
    }
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    info!(address = %listener.local_addr()?, "server running");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!(error = %e, "cannot listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

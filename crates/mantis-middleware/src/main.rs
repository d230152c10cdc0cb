//! mantis demo server
//!
//! An axum service instrumented by the request middleware:
//! - `/` and `/status/:code` are instrumented
//! - `/healthz`, `/metrics` expose liveness and self-metrics
//!
//! Usage: `mantis-demo [config.yaml]` (default `mantis.yaml`).

use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

use mantis_core::error::{MantisError, Result};
use mantis_middleware::{app_state, config, router};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(kind = e.kind().as_str(), error = %e, "mantis-demo failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "mantis.yaml".into());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .map_err(|e| MantisError::Configuration(format!("server.listen must be a valid SocketAddr: {e}")))?;

    let state = app_state::AppState::new(cfg, Vec::new())?;
    let api_url = state.cfg().transport.api_url.clone();
    let app = router::build_router(state);

    tracing::info!(%listen, %api_url, "mantis-demo starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| MantisError::Internal(format!("bind failed: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| MantisError::Internal(format!("server failed: {e}")))
}

//! Axum router wiring for the demo server.
//!
//! Application routes run behind the request instrumentor; operational
//! routes (`/healthz`, `/metrics`) are left uninstrumented.

use axum::{
    extract::Path,
    http::StatusCode,
    routing::get,
    Router,
};

use crate::{app_state::AppState, ops};

pub fn build_router(state: AppState) -> Router {
    let app = Router::new()
        .route("/", get(index))
        .route("/status/:code", get(status));
    let app = state.instrumentor().wrap(app);

    app.route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}

async fn index() -> &'static str {
    "mantis demo"
}

/// Respond with an arbitrary status, handy for exercising the error rate.
async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

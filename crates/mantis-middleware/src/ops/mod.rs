//! Operational HTTP endpoints for the demo server.
//!
//! - `/healthz` : liveness
//! - `/metrics` : instrumentation self-metrics, Prometheus text format

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::app_state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let counters = state.instrumentor().state();
    let extra = [
        ("mantis_requests_total", counters.total_requests()),
        ("mantis_error_responses_total", counters.total_errors()),
    ];
    let body = state.instrumentor().observability().render(&extra);

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

//! Router configuration.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{qr, scan};
use axum::{
    Router,
    routing::{get, post},
};
use ticket_scan_web::correlation_id_layer;
use tower_http::trace::TraceLayer;

/// Build the complete router.
///
/// - `/health`, `/ready`: probes, unauthenticated
/// - `/api/scan`, `/api/tickets/:id/qr`: bearer-authenticated
///
/// Every response carries an `X-Correlation-ID` header.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/scan", post(scan::scan_ticket))
        .route("/tickets/:id/qr", get(qr::ticket_qr));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}

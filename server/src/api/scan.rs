//! `POST /api/scan`.

use crate::auth::AuthenticatedCaller;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use ticket_scan_core::scan::{Disposition, ScanContext, ScanRequest, ScanResponse};
use ticket_scan_web::{AppError, ClientIp, CorrelationId};

/// Transport status for a determinate scan outcome.
#[must_use]
pub const fn status_for(disposition: Disposition) -> StatusCode {
    match disposition {
        Disposition::Determinate => StatusCode::OK,
        Disposition::BadRequest => StatusCode::BAD_REQUEST,
        Disposition::Forbidden => StatusCode::FORBIDDEN,
    }
}

/// Scan a ticket.
///
/// Authentication is checked before the body is read, so a request with
/// neither a token nor a valid body is a 401.
///
/// # Errors
///
/// - 400 if the body is not a valid scan request; an `INVALID` event is
///   still audited for the caller
/// - 401 if the bearer token is missing or unknown
/// - 500 if the ticket store fails or times out
pub async fn scan_ticket(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    ClientIp(ip_address): ClientIp,
    CorrelationId(correlation_id): CorrelationId,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScanResponse>), AppError> {
    let context = ScanContext {
        caller,
        ip_address,
        correlation_id: Some(correlation_id),
    };

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unparseable scan request");
            state.orchestrator.record_unreadable(&context).await;
            return Err(AppError::bad_request(rejection.body_text()));
        }
    };

    let report = state.orchestrator.scan(request, &context).await?;

    Ok((status_for(report.disposition), Json(report.response)))
}

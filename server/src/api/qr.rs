//! `GET /api/tickets/:id/qr`.
//!
//! Issues a fresh QR payload for a ticket. The ticket is only read; a QR is
//! issued whatever its status, and the scan pipeline decides at the gate.

use crate::auth::AuthenticatedCaller;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use ticket_scan_core::types::{Caller, Ticket, TicketId};
use ticket_scan_web::AppError;

/// Optional query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct QrQuery {
    /// Device hint embedded in the payload (`web` or `mobile`)
    pub device: Option<String>,
}

/// QR code material for the client to render.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeResponse {
    /// Serialized payload, the QR code content
    pub qr_data: String,
    /// Transport HMAC over `qr_data`
    pub signature: String,
    /// Issuance time, epoch milliseconds
    pub issued_at: i64,
}

/// Owner, admin, or the issuing vendor.
fn may_view(caller: &Caller, ticket: &Ticket) -> bool {
    caller.user_id == ticket.owner_id
        || caller.is_admin()
        || caller.vendor_identity().as_ref() == Some(&ticket.vendor_id)
}

/// Issue a QR payload for a ticket.
///
/// # Errors
///
/// - 401 if the bearer token is missing or unknown
/// - 403 if the caller is not the owner, an admin, or the issuing vendor
/// - 404 if the ticket does not exist
/// - 500 if the ticket store fails
pub async fn ticket_qr(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(ticket_id): Path<String>,
    Query(query): Query<QrQuery>,
) -> Result<Json<QrCodeResponse>, AppError> {
    let ticket_id = TicketId::new(ticket_id);
    let ticket = state
        .tickets
        .get(&ticket_id)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket", &ticket_id))?;

    if !may_view(&caller, &ticket) {
        tracing::warn!(
            ticket_id = %ticket_id,
            user_id = %caller.user_id,
            "QR requested by non-owner"
        );
        return Err(AppError::forbidden("Not authorized to view this ticket"));
    }

    let payload = match query.device.as_deref() {
        Some(device) => state.codec.encode_for_device(&ticket.id, device),
        None => state.codec.encode(&ticket.id),
    };
    let qr_data = payload.serialize();
    let signature = state.codec.engine().hmac_sign(qr_data.as_bytes());

    tracing::info!(ticket_id = %ticket.id, issued_at = payload.issued_at, "QR issued");
    Ok(Json(QrCodeResponse {
        qr_data,
        signature,
        issued_at: payload.issued_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ticket_scan_core::types::{GameId, Money, UserId, VendorId};

    fn ticket() -> Ticket {
        Ticket::issue(
            TicketId::new("t-1"),
            UserId::new("owner"),
            VendorId::new("vendor-a"),
            GameId::new("g-1"),
            Money::new(500, "GHS"),
            Utc::now(),
        )
    }

    #[test]
    fn test_may_view() {
        let ticket = ticket();
        assert!(may_view(&Caller::player("owner"), &ticket));
        assert!(may_view(&Caller::admin("root"), &ticket));
        assert!(may_view(&Caller::vendor("staff", "vendor-a"), &ticket));
        assert!(!may_view(&Caller::player("someone-else"), &ticket));
        assert!(!may_view(&Caller::vendor("staff", "vendor-b"), &ticket));
    }
}

//! HTTP API handlers.
//!
//! - `POST /api/scan` - scan a ticket id or QR payload
//! - `GET /api/tickets/:id/qr` - issue a fresh QR payload for a ticket

pub mod qr;
pub mod scan;

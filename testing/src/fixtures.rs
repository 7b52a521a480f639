//! Ready-made values for tests.

#![allow(clippy::expect_used)] // Hardcoded fixtures cannot fail

use crate::mocks::test_clock;
use chrono::{DateTime, Utc};
use ticket_scan_core::environment::Clock;
use ticket_scan_core::scan::ScanRequest;
use ticket_scan_core::signature::{SignatureEngine, SigningSecrets};
use ticket_scan_core::types::{
    ActorKind, Coupon, DeviceKind, GameId, Money, ScanEvent, ScanResult, Ticket, TicketId, UserId,
    VendorId,
};
use uuid::Uuid;

/// Secret used for the integrity hash in tests.
pub const HASH_SECRET: &str = "test-hash-secret";
/// Secret used for the transport HMAC in tests.
pub const HMAC_SECRET: &str = "test-hmac-secret";
/// Owner of every fixture ticket.
pub const OWNER: &str = "player-1";

/// The instant [`test_clock`] starts at.
#[must_use]
pub fn now() -> DateTime<Utc> {
    test_clock().now()
}

/// Secrets matching [`HASH_SECRET`] and [`HMAC_SECRET`].
#[must_use]
pub fn secrets() -> SigningSecrets {
    SigningSecrets::new(HASH_SECRET, HMAC_SECRET)
}

/// Engine keyed with the fixture secrets.
///
/// # Panics
///
/// Never: the fixture secrets are non-empty.
#[must_use]
pub fn engine() -> SignatureEngine {
    SignatureEngine::new(&secrets()).expect("fixture secrets are non-empty")
}

/// Valid ticket owned by [`OWNER`], issued by `vendor`.
#[must_use]
pub fn ticket(id: &str, vendor: &str) -> Ticket {
    Ticket::issue(
        TicketId::new(id),
        UserId::new(OWNER),
        VendorId::new(vendor),
        GameId::new("game-1"),
        Money::new(500, "GHS"),
        now(),
    )
}

/// Valid ticket carrying an unused coupon.
#[must_use]
pub fn ticket_with_coupon(id: &str, vendor: &str, code: &str) -> Ticket {
    ticket(id, vendor).with_coupon(Coupon {
        code: code.to_string(),
        description: Some("Free drink".to_string()),
        discount_minor: Some(200),
        used: false,
    })
}

/// Vendor scan of a ticket id.
#[must_use]
pub fn vendor_request(ticket_id: &str, vendor: Option<&str>) -> ScanRequest {
    ScanRequest {
        ticket_id: Some(ticket_id.to_string()),
        qr_data: None,
        signature: None,
        scanned_by: ActorKind::Vendor,
        vendor_id: vendor.map(VendorId::new),
        device: DeviceKind::Mobile,
        app_version: Some("1.0.0".to_string()),
    }
}

/// Player check of a ticket id.
#[must_use]
pub fn player_request(ticket_id: &str) -> ScanRequest {
    ScanRequest {
        scanned_by: ActorKind::Player,
        vendor_id: None,
        device: DeviceKind::Web,
        ..vendor_request(ticket_id, None)
    }
}

/// Scan of raw QR data, optionally with a transport signature.
#[must_use]
pub fn qr_request(qr_data: &str, signature: Option<&str>, scanned_by: ActorKind) -> ScanRequest {
    ScanRequest {
        ticket_id: None,
        qr_data: Some(qr_data.to_string()),
        signature: signature.map(str::to_string),
        scanned_by,
        vendor_id: None,
        device: DeviceKind::Mobile,
        app_version: None,
    }
}

/// Audit event with placeholder values.
#[must_use]
pub fn scan_event(ticket_id: Option<&str>) -> ScanEvent {
    ScanEvent {
        id: Uuid::new_v4(),
        ticket_id: ticket_id.map(TicketId::new),
        scanned_by: ActorKind::Player,
        user_id: UserId::new(OWNER),
        vendor_id: None,
        device: Some(DeviceKind::Web),
        app_version: None,
        result: ScanResult::Valid,
        message: "Ticket is valid".to_string(),
        scanned_at: now(),
        ip_address: None,
        correlation_id: None,
    }
}

//! HTTP API tests against in-memory stores.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use serde_json::{Value, json};
use std::sync::Arc;
use ticket_scan_core::scan::ScanOrchestrator;
use ticket_scan_core::token::TokenCodec;
use ticket_scan_core::types::{ActorKind, Caller, ScanResult, TicketStatus};
use ticket_scan_server::{AppState, build_router};
use ticket_scan_testing::{
    InMemoryScanEventLog, InMemoryTicketStore, StaticIdentityProvider, fixtures, init_tracing,
    test_clock,
};
use uuid::Uuid;

const VENDOR_TOKEN: &str = "vendor-a-token";
const OTHER_VENDOR_TOKEN: &str = "vendor-b-token";
const PLAYER_TOKEN: &str = "player-token";
const STRANGER_TOKEN: &str = "stranger-token";

struct App {
    server: TestServer,
    tickets: InMemoryTicketStore,
    events: InMemoryScanEventLog,
}

fn app() -> App {
    init_tracing();
    let tickets = InMemoryTicketStore::new();
    let events = InMemoryScanEventLog::new();
    let clock = Arc::new(test_clock());
    let engine = Arc::new(fixtures::engine());

    let orchestrator = ScanOrchestrator::new(
        Arc::new(tickets.clone()),
        Arc::new(events.clone()),
        Arc::clone(&engine),
        clock.clone(),
    );
    let codec = TokenCodec::new(engine, clock);
    let identity = StaticIdentityProvider::new()
        .with(VENDOR_TOKEN, Caller::vendor("staff-a", "vendor-a"))
        .with(OTHER_VENDOR_TOKEN, Caller::vendor("staff-b", "vendor-b"))
        .with(PLAYER_TOKEN, Caller::player(fixtures::OWNER))
        .with(STRANGER_TOKEN, Caller::player("someone-else"));

    let state = AppState::new(
        orchestrator,
        codec,
        Arc::new(tickets.clone()),
        Arc::new(identity),
    );
    let server = TestServer::new(build_router(state)).expect("test server");

    App {
        server,
        tickets,
        events,
    }
}

fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        axum::http::header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

fn vendor_scan(ticket_id: &str) -> Value {
    json!({
        "ticketId": ticket_id,
        "scannedBy": "vendor",
        "vendorId": "vendor-a",
        "device": "mobile",
        "appVersion": "2.4.1"
    })
}

impl App {
    async fn scan(&self, token: &str, body: &Value) -> TestResponse {
        let (name, value) = bearer(token);
        self.server
            .post("/api/scan")
            .add_header(name, value)
            .json(body)
            .await
    }
}

#[tokio::test]
async fn test_scan_requires_bearer_token() {
    let app = app();
    app.tickets.put(fixtures::ticket("t-1", "vendor-a"));

    let response = app.server.post("/api/scan").json(&vendor_scan("t-1")).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED");
    assert!(app.events.is_empty(), "unauthenticated requests are not audited");
}

#[tokio::test]
async fn test_scan_rejects_unknown_token() {
    let app = app();

    let response = app.scan("forged", &vendor_scan("t-1")).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unparseable_body_is_bad_request() {
    let app = app();
    let (name, value) = bearer(VENDOR_TOKEN);

    let response = app
        .server
        .post("/api/scan")
        .add_header(name, value)
        .text("{not json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "BAD_REQUEST");

    let events = app.events.events();
    assert_eq!(events.len(), 1, "authenticated garbage is still audited");
    assert_eq!(events[0].result, ScanResult::Invalid);
    assert_eq!(events[0].scanned_by, ActorKind::Vendor);
    assert_eq!(events[0].user_id.as_str(), "staff-a");
    assert_eq!(events[0].ticket_id, None);
    assert_eq!(events[0].device, None);
}

#[tokio::test]
async fn test_vendor_redeems_then_already_used() {
    let app = app();
    app.tickets.put(fixtures::ticket("t-1", "vendor-a"));

    let first = app.scan(VENDOR_TOKEN, &vendor_scan("t-1")).await;
    first.assert_status_ok();
    first.assert_json(&json!({
        "success": true,
        "result": "VALIDATED",
        "message": "Ticket validated successfully",
        "ticketId": "t-1"
    }));

    let second = app.scan(VENDOR_TOKEN, &vendor_scan("t-1")).await;
    second.assert_status_ok();
    let body = second.json::<Value>();
    assert_eq!(body["success"], false);
    assert_eq!(body["result"], "ALREADY_USED");

    assert!(matches!(
        app.tickets.snapshot("t-1").unwrap().status,
        TicketStatus::Used { .. }
    ));
    assert_eq!(app.events.len(), 2);
}

#[tokio::test]
async fn test_missing_ticket_id_is_bad_request() {
    let app = app();

    let response = app
        .scan(
            VENDOR_TOKEN,
            &json!({"scannedBy": "vendor", "vendorId": "vendor-a", "device": "web"}),
        )
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["result"], "INVALID");
    assert_eq!(body["message"], "No ticket ID provided");
    assert_eq!(body["ticketId"], "");
    assert_eq!(app.events.len(), 1);
}

#[tokio::test]
async fn test_vendor_mismatch_is_forbidden() {
    let app = app();
    app.tickets.put(fixtures::ticket("t-1", "vendor-a"));

    let mut body = vendor_scan("t-1");
    body["vendorId"] = json!("vendor-b");
    let response = app.scan(OTHER_VENDOR_TOKEN, &body).await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body = response.json::<Value>();
    assert_eq!(body["result"], "INVALID");
    assert_eq!(body["message"], "Ticket does not belong to this vendor");
    assert_eq!(app.tickets.snapshot("t-1").unwrap().status, TicketStatus::Valid);
}

#[tokio::test]
async fn test_unknown_ticket_is_ok_invalid() {
    let app = app();

    let response = app.scan(VENDOR_TOKEN, &vendor_scan("missing")).await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["message"], "Ticket not found");
    assert_eq!(app.events.events()[0].result, ScanResult::Invalid);
}

#[tokio::test]
async fn test_store_failure_is_internal_error() {
    let app = app();
    app.tickets.set_unavailable(true);

    let response = app.scan(VENDOR_TOKEN, &vendor_scan("t-1")).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({
        "code": "INTERNAL_SERVER_ERROR",
        "message": "Internal server error"
    }));
    let events = app.events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message, "Internal server error");
}

#[tokio::test]
async fn test_request_context_is_audited() {
    let app = app();
    app.tickets.put(fixtures::ticket("t-1", "vendor-a"));
    let correlation_id = Uuid::new_v4();
    let (name, value) = bearer(VENDOR_TOKEN);

    let response = app
        .server
        .post("/api/scan")
        .add_header(name, value)
        .add_header(
            HeaderName::from_static("x-correlation-id"),
            HeaderValue::from_str(&correlation_id.to_string()).unwrap(),
        )
        .add_header(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("203.0.113.7"),
        )
        .json(&vendor_scan("t-1"))
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.header("x-correlation-id"),
        correlation_id.to_string().as_str()
    );
    let event = &app.events.events()[0];
    assert_eq!(event.correlation_id, Some(correlation_id));
    assert_eq!(event.ip_address, Some("203.0.113.7".parse().unwrap()));
    assert_eq!(event.app_version.as_deref(), Some("2.4.1"));
}

#[tokio::test]
async fn test_issued_qr_redeems_at_the_gate() {
    let app = app();
    app.tickets.put(fixtures::ticket("t-1", "vendor-a"));
    let (name, value) = bearer(PLAYER_TOKEN);

    let issued = app
        .server
        .get("/api/tickets/t-1/qr")
        .add_header(name, value)
        .await;
    issued.assert_status_ok();
    let qr = issued.json::<Value>();
    assert_eq!(qr["issuedAt"], fixtures::now().timestamp_millis());

    let response = app
        .scan(
            VENDOR_TOKEN,
            &json!({
                "qrData": qr["qrData"],
                "signature": qr["signature"],
                "scannedBy": "vendor",
                "device": "mobile"
            }),
        )
        .await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["result"], "VALIDATED");
    assert_eq!(body["ticketId"], "t-1");
}

#[tokio::test]
async fn test_tampered_qr_signature_is_invalid() {
    let app = app();
    app.tickets.put(fixtures::ticket("t-1", "vendor-a"));
    let (name, value) = bearer(PLAYER_TOKEN);
    let qr = app
        .server
        .get("/api/tickets/t-1/qr")
        .add_header(name, value)
        .await
        .json::<Value>();

    let response = app
        .scan(
            VENDOR_TOKEN,
            &json!({
                "qrData": qr["qrData"],
                "signature": "00".repeat(32),
                "scannedBy": "vendor",
                "device": "mobile"
            }),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["message"], "Invalid signature");
    assert_eq!(app.tickets.snapshot("t-1").unwrap().status, TicketStatus::Valid);
}

#[tokio::test]
async fn test_qr_access_control() {
    let app = app();
    app.tickets.put(fixtures::ticket("t-1", "vendor-a"));

    let get = |token: &str| {
        let (name, value) = bearer(token);
        app.server.get("/api/tickets/t-1/qr").add_header(name, value)
    };

    get(VENDOR_TOKEN).await.assert_status_ok();
    get(STRANGER_TOKEN).await.assert_status(StatusCode::FORBIDDEN);
    get(OTHER_VENDOR_TOKEN)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let (name, value) = bearer(PLAYER_TOKEN);
    app.server
        .get("/api/tickets/nope/qr")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get("/api/tickets/t-1/qr")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = app();

    let health = app.server.get("/health").await;
    health.assert_status_ok();
    assert_eq!(health.json::<Value>()["status"], "ok");

    let ready = app.server.get("/ready").await;
    ready.assert_status_ok();
    ready.assert_json(&json!({"ready": true, "database": true}));
}

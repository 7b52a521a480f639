//! QR payload codec.
//!
//! A QR code carries a small JSON document:
//!
//! ```json
//! {"ticketId":"…","hash":"…","issuedAt":1735689600000,"deviceType":"mobile"}
//! ```
//!
//! `hash` binds `ticketId` and `issuedAt` to the server secret (see
//! [`SignatureEngine::hash`]). Nothing here is persisted: a payload can be
//! re-derived from the ticket id at any time.

use crate::environment::Clock;
use crate::signature::SignatureEngine;
use crate::types::TicketId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Decoded QR payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    /// Ticket the code refers to
    pub ticket_id: TicketId,
    /// Integrity hash over ticket id and issuance time
    pub hash: String,
    /// Issuance time in epoch milliseconds
    pub issued_at: i64,
    /// Optional client hint, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
}

impl QrPayload {
    /// Serialize to the compact JSON form embedded in the QR image.
    #[must_use]
    pub fn serialize(&self) -> String {
        // String and integer fields only; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a scanned string.
    ///
    /// Returns `None` for anything that is not a JSON object with a
    /// non-empty `ticketId`, a non-empty `hash` and an integer `issuedAt`.
    #[must_use]
    pub fn deserialize(data: &str) -> Option<Self> {
        let payload: Self = serde_json::from_str(data).ok()?;
        if payload.ticket_id.as_str().is_empty() || payload.hash.is_empty() {
            return None;
        }
        Some(payload)
    }
}

/// Builds fresh payloads for tickets.
#[derive(Clone)]
pub struct TokenCodec {
    engine: Arc<SignatureEngine>,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Create a codec over the shared engine and clock.
    #[must_use]
    pub fn new(engine: Arc<SignatureEngine>, clock: Arc<dyn Clock>) -> Self {
        Self { engine, clock }
    }

    /// Payload for `ticket_id`, issued now.
    #[must_use]
    pub fn encode(&self, ticket_id: &TicketId) -> QrPayload {
        let issued_at = self.clock.now_millis();
        QrPayload {
            ticket_id: ticket_id.clone(),
            hash: self.engine.hash(ticket_id, issued_at),
            issued_at,
            device_type: None,
        }
    }

    /// Payload carrying a device hint.
    #[must_use]
    pub fn encode_for_device(&self, ticket_id: &TicketId, device_type: &str) -> QrPayload {
        QrPayload {
            device_type: Some(device_type.to_string()),
            ..self.encode(ticket_id)
        }
    }

    /// The engine payloads are signed with.
    #[must_use]
    pub fn engine(&self) -> &SignatureEngine {
        &self.engine
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::signature::SigningSecrets;
    use chrono::{DateTime, TimeZone, Utc};

    struct Frozen(DateTime<Utc>);

    impl Clock for Frozen {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn codec() -> TokenCodec {
        let engine = SignatureEngine::new(&SigningSecrets::shared("codec-secret")).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        TokenCodec::new(Arc::new(engine), Arc::new(Frozen(now)))
    }

    #[test]
    fn test_encode_uses_clock_and_engine() {
        let codec = codec();
        let id = TicketId::new("ticket-001");
        let payload = codec.encode(&id);

        assert_eq!(payload.issued_at, 1_735_689_600_000);
        assert_eq!(payload.hash, codec.engine().hash(&id, payload.issued_at));
        assert!(payload.device_type.is_none());
    }

    #[test]
    fn test_serialize_field_names() {
        let payload = codec().encode_for_device(&TicketId::new("t-1"), "mobile");
        let value: serde_json::Value = serde_json::from_str(&payload.serialize()).unwrap();

        assert_eq!(value["ticketId"], "t-1");
        assert_eq!(value["issuedAt"], 1_735_689_600_000_i64);
        assert_eq!(value["deviceType"], "mobile");
        assert!(value["hash"].is_string());
    }

    #[test]
    fn test_serialize_is_compact_in_field_order() {
        let payload = codec().encode_for_device(&TicketId::new("t-1"), "mobile");
        assert_eq!(
            payload.serialize(),
            format!(
                r#"{{"ticketId":"t-1","hash":"{}","issuedAt":1735689600000,"deviceType":"mobile"}}"#,
                payload.hash
            )
        );
    }

    #[test]
    fn test_serialize_omits_absent_device() {
        let payload = codec().encode(&TicketId::new("t-1"));
        assert!(!payload.serialize().contains("deviceType"));
    }

    #[test]
    fn test_deserialize_round_trip() {
        let payload = codec().encode_for_device(&TicketId::new("t-1"), "web");
        assert_eq!(QrPayload::deserialize(&payload.serialize()), Some(payload));
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        for input in [
            "",
            "not json",
            "[]",
            "{}",
            r#"{"ticketId":"t-1","issuedAt":1}"#,
            r#"{"hash":"abc","issuedAt":1}"#,
            r#"{"ticketId":"t-1","hash":"abc"}"#,
            r#"{"ticketId":"","hash":"abc","issuedAt":1}"#,
            r#"{"ticketId":"t-1","hash":"","issuedAt":1}"#,
            r#"{"ticketId":"t-1","hash":"abc","issuedAt":"yesterday"}"#,
            r#"{"ticketId":42,"hash":"abc","issuedAt":1}"#,
        ] {
            assert!(QrPayload::deserialize(input).is_none(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_deserialize_ignores_unknown_fields() {
        let parsed = QrPayload::deserialize(r#"{"ticketId":"t-1","hash":"h","issuedAt":5,"extra":true}"#);
        assert_eq!(parsed.map(|p| p.issued_at), Some(5));
    }
}

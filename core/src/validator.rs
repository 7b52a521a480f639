//! Freshness and integrity checks for scanned QR payloads.

use crate::environment::Clock;
use crate::signature::{SignatureEngine, SignatureError};
use crate::token::QrPayload;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default maximum payload age: 24 hours.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Why a payload was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PayloadRejection {
    /// Issued longer than the maximum age ago
    #[error("payload is older than the maximum age")]
    Stale,
    /// Well-formed hash that does not match
    #[error("payload hash does not match")]
    HashMismatch,
    /// Hash is not a 64-character hex digest
    #[error("payload hash is malformed")]
    MalformedHash,
}

/// Decides whether a decoded payload is fresh and authentic.
#[derive(Clone)]
pub struct PayloadValidator {
    engine: Arc<SignatureEngine>,
    clock: Arc<dyn Clock>,
    max_age_ms: i64,
}

impl PayloadValidator {
    /// Validator with the default 24h window.
    #[must_use]
    pub fn new(engine: Arc<SignatureEngine>, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine,
            clock,
            max_age_ms: duration_millis(DEFAULT_MAX_AGE),
        }
    }

    /// Override the freshness window.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age_ms = duration_millis(max_age);
        self
    }

    /// Configured freshness window in milliseconds.
    #[must_use]
    pub const fn max_age_ms(&self) -> i64 {
        self.max_age_ms
    }

    /// `true` iff the hash verifies and the payload is not stale.
    #[must_use]
    pub fn validate(&self, payload: &QrPayload) -> bool {
        self.check(payload).is_ok()
    }

    /// Like [`validate`](Self::validate) but reports the reason.
    ///
    /// A payload stamped in the future is accepted; only age counts.
    ///
    /// # Errors
    ///
    /// Returns the first [`PayloadRejection`] that applies. Freshness is
    /// checked first, since it needs no hashing.
    pub fn check(&self, payload: &QrPayload) -> Result<(), PayloadRejection> {
        let age_ms = self.clock.now_millis().saturating_sub(payload.issued_at);
        if age_ms > self.max_age_ms {
            tracing::debug!(
                ticket_id = %payload.ticket_id,
                age_ms,
                max_age_ms = self.max_age_ms,
                "QR payload is stale"
            );
            return Err(PayloadRejection::Stale);
        }

        match self
            .engine
            .verify_hash(&payload.ticket_id, payload.issued_at, &payload.hash)
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::debug!(ticket_id = %payload.ticket_id, "QR payload hash mismatch");
                Err(PayloadRejection::HashMismatch)
            }
            Err(SignatureError::MalformedDigest | SignatureError::MalformedSignature) => {
                tracing::debug!(ticket_id = %payload.ticket_id, "QR payload hash is malformed");
                Err(PayloadRejection::MalformedHash)
            }
            Err(SignatureError::EmptySecret) => Err(PayloadRejection::HashMismatch),
        }
    }
}

impl std::fmt::Debug for PayloadValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadValidator")
            .field("max_age_ms", &self.max_age_ms)
            .finish_non_exhaustive()
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::signature::SigningSecrets;
    use crate::types::TicketId;
    use chrono::{DateTime, TimeZone, Utc};

    const HOUR_MS: i64 = 60 * 60 * 1000;

    struct Frozen(DateTime<Utc>);

    impl Clock for Frozen {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn setup() -> (Arc<SignatureEngine>, PayloadValidator, i64) {
        let engine = Arc::new(SignatureEngine::new(&SigningSecrets::shared("validator")).unwrap());
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let validator = PayloadValidator::new(Arc::clone(&engine), Arc::new(Frozen(now)));
        (engine, validator, now.timestamp_millis())
    }

    fn payload(engine: &SignatureEngine, id: &str, issued_at: i64) -> QrPayload {
        let ticket_id = TicketId::new(id);
        QrPayload {
            hash: engine.hash(&ticket_id, issued_at),
            ticket_id,
            issued_at,
            device_type: None,
        }
    }

    #[test]
    fn test_fresh_payload_validates() {
        let (engine, validator, now) = setup();
        assert!(validator.validate(&payload(&engine, "t-1", now)));
    }

    #[test]
    fn test_freshness_boundary() {
        let (engine, validator, now) = setup();

        let just_inside = now - (23 * HOUR_MS + 59 * 60 * 1000);
        assert!(validator.validate(&payload(&engine, "t-1", just_inside)));

        let exactly = now - 24 * HOUR_MS;
        assert!(validator.validate(&payload(&engine, "t-1", exactly)));

        let just_outside = now - 24 * HOUR_MS - 1;
        assert_eq!(
            validator.check(&payload(&engine, "t-1", just_outside)),
            Err(PayloadRejection::Stale)
        );
    }

    #[test]
    fn test_future_issued_at_is_accepted() {
        let (engine, validator, now) = setup();
        assert!(validator.validate(&payload(&engine, "t-1", now + HOUR_MS)));
    }

    #[test]
    fn test_tampered_fields_fail() {
        let (engine, validator, now) = setup();
        let original = payload(&engine, "t-1", now);

        let mut other_id = original.clone();
        other_id.ticket_id = TicketId::new("t-2");
        assert_eq!(validator.check(&other_id), Err(PayloadRejection::HashMismatch));

        let mut other_time = original;
        other_time.issued_at -= 1;
        assert_eq!(validator.check(&other_time), Err(PayloadRejection::HashMismatch));
    }

    #[test]
    fn test_malformed_hash_is_false_not_error() {
        let (_, validator, now) = setup();
        let bad = QrPayload {
            ticket_id: TicketId::new("t-1"),
            hash: "short".to_string(),
            issued_at: now,
            device_type: None,
        };
        assert!(!validator.validate(&bad));
        assert_eq!(validator.check(&bad), Err(PayloadRejection::MalformedHash));
    }

    #[test]
    fn test_custom_max_age() {
        let (engine, validator, now) = setup();
        let validator = validator.with_max_age(Duration::from_secs(60));
        assert_eq!(validator.max_age_ms(), 60_000);
        assert!(!validator.validate(&payload(&engine, "t-1", now - 61_000)));
        assert!(validator.validate(&payload(&engine, "t-1", now - 59_000)));
    }

    #[test]
    fn test_different_secret_fails() {
        let (_, validator, now) = setup();
        let foreign = SignatureEngine::new(&SigningSecrets::shared("someone-else")).unwrap();
        assert!(!validator.validate(&payload(&foreign, "t-1", now)));
    }
}

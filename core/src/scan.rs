//! Scan orchestration.
//!
//! A scan request goes through a fixed pipeline:
//!
//! ```text
//! deserialize QR ─▶ hash + freshness ─▶ HMAC ─▶ resolve actor
//!     ─▶ fetch ticket ─▶ decide ─▶ conditional write ─▶ audit
//! ```
//!
//! Every request produces exactly one [`ScanEvent`], whatever the outcome,
//! including store failures. Audit failures are logged and never change
//! the response.

use crate::environment::Clock;
use crate::redemption::{self, Actor, Decision, Rejection};
use crate::signature::SignatureEngine;
use crate::store::{ScanEventLog, StoreError, StoreFuture, TicketStore, Transition};
use crate::token::QrPayload;
use crate::types::{
    ActorKind, Caller, Coupon, DeviceKind, ScanEvent, ScanResult, Ticket, TicketId, VendorId,
};
use crate::validator::PayloadValidator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Default per-call timeout for ticket store operations.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Counter of processed scans, labelled by `result`.
pub const SCANS_TOTAL: &str = "ticket_scans_total";
/// Counter of successful `valid → used` transitions.
pub const REDEMPTIONS_TOTAL: &str = "ticket_redemptions_total";
/// Counter of audit events that could not be written.
pub const AUDIT_FAILURES_TOTAL: &str = "ticket_scan_audit_failures_total";
/// Histogram of end-to-end scan latency.
pub const SCAN_DURATION_SECONDS: &str = "ticket_scan_duration_seconds";

/// Message returned and audited when the store fails.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Message audited when the request body cannot be parsed.
pub const UNREADABLE_REQUEST_MESSAGE: &str = "Invalid request body";

// ============================================================================
// Request / response
// ============================================================================

/// Body of a scan request.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    /// Ticket id typed in or already known
    #[serde(default)]
    pub ticket_id: Option<String>,
    /// Raw QR payload string
    #[serde(default)]
    pub qr_data: Option<String>,
    /// HMAC over `qr_data`
    #[serde(default)]
    pub signature: Option<String>,
    /// Whether a player or a vendor is scanning
    pub scanned_by: ActorKind,
    /// Vendor the scan is for
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    /// Client surface
    pub device: DeviceKind,
    /// Client version
    #[serde(default)]
    pub app_version: Option<String>,
}

/// Request metadata collected at the transport boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanContext {
    /// Authenticated caller
    pub caller: Caller,
    /// Source IP, when known
    pub ip_address: Option<IpAddr>,
    /// Request correlation id
    pub correlation_id: Option<Uuid>,
}

impl ScanContext {
    /// Context with no transport metadata.
    #[must_use]
    pub const fn for_caller(caller: Caller) -> Self {
        Self {
            caller,
            ip_address: None,
            correlation_id: None,
        }
    }
}

/// Coupon shown to a player after a successful check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponView {
    /// Code to redeem
    pub code: String,
    /// Description, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Discount in minor units, if fixed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_minor: Option<i64>,
}

impl From<&Coupon> for CouponView {
    fn from(coupon: &Coupon) -> Self {
        Self {
            code: coupon.code.clone(),
            description: coupon.description.clone(),
            discount_minor: coupon.discount_minor,
        }
    }
}

/// Body returned to the scanning client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    /// `true` only for `VALIDATED` and `VALID`
    pub success: bool,
    /// Outcome code
    pub result: ScanResult,
    /// Human-readable message
    pub message: String,
    /// Resolved ticket id, empty when none could be resolved
    pub ticket_id: String,
    /// Unused coupon, only on a successful player check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<CouponView>,
}

/// How the transport should report a determinate outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Normal outcome (200), including `INVALID`
    Determinate,
    /// Request is missing required input (400)
    BadRequest,
    /// Caller may not act for this vendor or ticket (403)
    Forbidden,
}

/// Result of a completed scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanReport {
    /// Body for the client
    pub response: ScanResponse,
    /// Transport mapping
    pub disposition: Disposition,
}

/// Scan could not reach a determinate outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Ticket store failed or timed out. No mutation may be assumed.
    #[error("Ticket store failure: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// Orchestrator
// ============================================================================

#[derive(Debug)]
struct Verdict {
    result: ScanResult,
    message: &'static str,
    disposition: Disposition,
    coupon: Option<CouponView>,
}

impl Verdict {
    const fn determinate(result: ScanResult, message: &'static str) -> Self {
        Self {
            result,
            message,
            disposition: Disposition::Determinate,
            coupon: None,
        }
    }

    const fn invalid(message: &'static str, disposition: Disposition) -> Self {
        Self {
            result: ScanResult::Invalid,
            message,
            disposition,
            coupon: None,
        }
    }

    const fn rejected(rejection: Rejection) -> Self {
        let disposition = match rejection {
            Rejection::VendorMismatch => Disposition::Forbidden,
            Rejection::AlreadyUsed | Rejection::Expired => Disposition::Determinate,
        };
        Self {
            result: rejection.outcome(),
            message: rejection.message(),
            disposition,
            coupon: None,
        }
    }
}

/// What the pipeline learned before it stopped, for the audit record.
#[derive(Debug, Default)]
struct Trail {
    ticket_id: Option<TicketId>,
    vendor_id: Option<VendorId>,
}

/// Drives a scan request to exactly one outcome and one audit event.
#[derive(Clone)]
pub struct ScanOrchestrator {
    tickets: Arc<dyn TicketStore>,
    events: Arc<dyn ScanEventLog>,
    engine: Arc<SignatureEngine>,
    validator: PayloadValidator,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl ScanOrchestrator {
    /// Create an orchestrator with the default freshness window and store
    /// timeout.
    #[must_use]
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        events: Arc<dyn ScanEventLog>,
        engine: Arc<SignatureEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let validator = PayloadValidator::new(Arc::clone(&engine), Arc::clone(&clock));
        Self {
            tickets,
            events,
            engine,
            validator,
            clock,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Override the QR freshness window.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.validator = self.validator.with_max_age(max_age);
        self
    }

    /// Override the per-call store timeout.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Process one scan request.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] when the ticket store fails or times out. An
    /// `INVALID` audit event is still written in that case.
    #[tracing::instrument(
        skip(self, request, context),
        fields(
            user_id = %context.caller.user_id,
            scanned_by = %request.scanned_by,
            device = %request.device,
        )
    )]
    pub async fn scan(
        &self,
        request: ScanRequest,
        context: &ScanContext,
    ) -> Result<ScanReport, ScanError> {
        let started = Instant::now();
        let now = self.clock.now();
        let mut trail = Trail::default();

        let evaluated = self
            .evaluate(&request, &context.caller, now, &mut trail)
            .await;

        let (result, message) = match &evaluated {
            Ok(verdict) => (verdict.result, verdict.message),
            Err(_) => (ScanResult::Invalid, INTERNAL_ERROR_MESSAGE),
        };
        self.record(ScanEvent {
            id: Uuid::new_v4(),
            ticket_id: trail.ticket_id.clone(),
            scanned_by: request.scanned_by,
            user_id: context.caller.user_id.clone(),
            vendor_id: trail.vendor_id.clone(),
            device: Some(request.device),
            app_version: request.app_version.clone(),
            result,
            message: message.to_string(),
            scanned_at: now,
            ip_address: context.ip_address,
            correlation_id: context.correlation_id,
        })
        .await;

        metrics::counter!(SCANS_TOTAL, "result" => result.as_str()).increment(1);
        metrics::histogram!(SCAN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        let verdict = match evaluated {
            Ok(verdict) => verdict,
            Err(error) => {
                tracing::error!(
                    ticket_id = ?trail.ticket_id,
                    error = %error,
                    "Scan failed on ticket store"
                );
                return Err(error);
            }
        };

        tracing::info!(
            ticket_id = ?trail.ticket_id,
            vendor_id = ?trail.vendor_id,
            result = %verdict.result,
            "Scan processed"
        );

        Ok(ScanReport {
            response: ScanResponse {
                success: verdict.result.is_success(),
                result: verdict.result,
                message: verdict.message.to_string(),
                ticket_id: trail
                    .ticket_id
                    .map(TicketId::into_inner)
                    .unwrap_or_default(),
                coupon: verdict.coupon,
            },
            disposition: verdict.disposition,
        })
    }

    /// Audit a request from an authenticated caller whose body could not be
    /// parsed. The transport still answers 400; this only writes the event.
    pub async fn record_unreadable(&self, context: &ScanContext) {
        let caller = &context.caller;
        self.record(ScanEvent {
            id: Uuid::new_v4(),
            ticket_id: None,
            scanned_by: caller.actor_kind(),
            user_id: caller.user_id.clone(),
            vendor_id: caller.vendor_identity(),
            device: None,
            app_version: None,
            result: ScanResult::Invalid,
            message: UNREADABLE_REQUEST_MESSAGE.to_string(),
            scanned_at: self.clock.now(),
            ip_address: context.ip_address,
            correlation_id: context.correlation_id,
        })
        .await;

        metrics::counter!(SCANS_TOTAL, "result" => ScanResult::Invalid.as_str()).increment(1);
        tracing::info!(user_id = %caller.user_id, "Unreadable scan request recorded");
    }

    async fn evaluate(
        &self,
        request: &ScanRequest,
        caller: &Caller,
        now: DateTime<Utc>,
        trail: &mut Trail,
    ) -> Result<Verdict, ScanError> {
        trail.ticket_id = request
            .ticket_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(TicketId::from);

        if trail.ticket_id.is_none() {
            if let Some(qr_data) = &request.qr_data {
                let Some(payload) = QrPayload::deserialize(qr_data) else {
                    return Ok(Verdict::determinate(
                        ScanResult::Invalid,
                        "Invalid QR code format",
                    ));
                };
                trail.ticket_id = Some(payload.ticket_id.clone());
                if !self.validator.validate(&payload) {
                    return Ok(Verdict::determinate(
                        ScanResult::Invalid,
                        "QR code validation failed",
                    ));
                }
            }
        }

        if let (Some(qr_data), Some(signature)) = (&request.qr_data, &request.signature) {
            if !matches!(
                self.engine.verify_hmac(qr_data.as_bytes(), signature),
                Ok(true)
            ) {
                tracing::debug!(ticket_id = ?trail.ticket_id, "QR signature rejected");
                return Ok(Verdict::determinate(ScanResult::Invalid, "Invalid signature"));
            }
        }

        let Some(ticket_id) = trail.ticket_id.clone() else {
            return Ok(Verdict::invalid(
                "No ticket ID provided",
                Disposition::BadRequest,
            ));
        };

        let actor = match request.scanned_by {
            ActorKind::Player => Actor::Player,
            ActorKind::Vendor => {
                let Some(vendor_id) = request
                    .vendor_id
                    .clone()
                    .filter(|v| !v.as_str().is_empty())
                    .or_else(|| caller.vendor_identity())
                else {
                    return Ok(Verdict::invalid("Vendor ID required", Disposition::BadRequest));
                };
                trail.vendor_id = Some(vendor_id.clone());

                if !caller.is_admin() && caller.vendor_identity().as_ref() != Some(&vendor_id) {
                    tracing::warn!(
                        user_id = %caller.user_id,
                        vendor_id = %vendor_id,
                        "Caller attempted to scan for another vendor"
                    );
                    return Ok(Verdict::invalid(
                        "Not authorized to scan for this vendor",
                        Disposition::Forbidden,
                    ));
                }

                Actor::Vendor {
                    vendor_id,
                    elevated: caller.is_admin(),
                }
            }
        };

        let Some(ticket) = self.bounded(self.tickets.get(&ticket_id)).await? else {
            return Ok(Verdict::determinate(ScanResult::Invalid, "Ticket not found"));
        };

        match redemption::decide(&ticket, &actor, request.device, now) {
            Decision::Reject(rejection) => Ok(Verdict::rejected(rejection)),
            Decision::Redeem(redemption) => {
                let transition = self
                    .bounded(self.tickets.mark_used(&ticket_id, &redemption, now))
                    .await?;
                Ok(match transition {
                    Transition::Applied(_) => {
                        metrics::counter!(REDEMPTIONS_TOTAL).increment(1);
                        Verdict::determinate(ScanResult::Validated, "Ticket validated successfully")
                    }
                    Transition::Rejected(current) => lost_race(&current, now),
                    Transition::NotFound => {
                        Verdict::determinate(ScanResult::Invalid, "Ticket not found")
                    }
                })
            }
            Decision::Acknowledge(scan) => {
                let transition = self
                    .bounded(self.tickets.touch_last_scan(&ticket_id, scan))
                    .await?;
                Ok(match transition {
                    Transition::Applied(current) => Verdict {
                        coupon: current.unused_coupon().map(CouponView::from),
                        ..Verdict::determinate(ScanResult::Valid, "Ticket is valid")
                    },
                    Transition::Rejected(current) => lost_race(&current, now),
                    Transition::NotFound => {
                        Verdict::determinate(ScanResult::Invalid, "Ticket not found")
                    }
                })
            }
        }
    }

    async fn bounded<T>(&self, call: StoreFuture<'_, T>) -> Result<T, StoreError> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))?
    }

    async fn record(&self, event: ScanEvent) {
        let event_id = event.id;
        let appended = tokio::time::timeout(self.store_timeout, self.events.append(event))
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))
            .and_then(|appended| appended);

        if let Err(error) = appended {
            metrics::counter!(AUDIT_FAILURES_TOTAL).increment(1);
            tracing::error!(event_id = %event_id, error = %error, "Failed to record scan event");
        }
    }
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("validator", &self.validator)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

/// A conditional write found the ticket in another state than `decide` saw.
fn lost_race(current: &Ticket, now: DateTime<Utc>) -> Verdict {
    Verdict::rejected(redemption::status_rejection(current, now).unwrap_or(Rejection::AlreadyUsed))
}

//! Redemption state machine.
//!
//! [`decide`] is the pure half: given the current ticket, who is scanning
//! and when, it returns what should happen. Stores persist the decision with
//! a conditional write so that two concurrent vendor scans cannot both
//! redeem; [`apply_redemption`] and [`apply_last_scan`] are the in-memory
//! form of that conditional write.
//!
//! ```text
//! valid ──vendor──▶ used        (redemption written, last scan set)
//! valid ──player──▶ valid       (last scan set)
//! used  ──any────▶ used         ALREADY_USED
//! expired ─any───▶ unchanged    EXPIRED
//! ```

use crate::types::{
    ActorKind, DeviceKind, LastScan, Redemption, ScanResult, Ticket, TicketStatus, VendorId,
};
use chrono::{DateTime, Utc};

/// Who is scanning, after authentication and vendor resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Actor {
    /// Ticket holder checking the ticket
    Player,
    /// Vendor redeeming the ticket
    Vendor {
        /// Vendor the scan is performed for
        vendor_id: VendorId,
        /// Admin callers skip the ownership check
        elevated: bool,
    },
}

impl Actor {
    /// Audit kind of this actor.
    #[must_use]
    pub const fn kind(&self) -> ActorKind {
        match self {
            Self::Player => ActorKind::Player,
            Self::Vendor { .. } => ActorKind::Vendor,
        }
    }
}

/// Why a scan could not proceed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Ticket was already redeemed
    AlreadyUsed,
    /// Ticket is expired
    Expired,
    /// Vendor scan for a ticket issued by someone else
    VendorMismatch,
}

impl Rejection {
    /// Result reported to the client.
    #[must_use]
    pub const fn outcome(self) -> ScanResult {
        match self {
            Self::AlreadyUsed => ScanResult::AlreadyUsed,
            Self::Expired => ScanResult::Expired,
            Self::VendorMismatch => ScanResult::Invalid,
        }
    }

    /// Message reported to the client. Never names the owning vendor.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::AlreadyUsed => "Ticket already used",
            Self::Expired => "Ticket has expired",
            Self::VendorMismatch => "Ticket does not belong to this vendor",
        }
    }
}

/// What a scan should do to the ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Transition `valid → used`
    Redeem(Redemption),
    /// Leave status alone, record the scan
    Acknowledge(LastScan),
    /// No mutation
    Reject(Rejection),
}

/// Decide what a scan does to `ticket`.
///
/// Vendor ownership is checked before status, so a foreign vendor learns
/// nothing about the ticket.
#[must_use]
pub fn decide(ticket: &Ticket, actor: &Actor, device: DeviceKind, now: DateTime<Utc>) -> Decision {
    if matches!(
        actor,
        Actor::Vendor { vendor_id, elevated: false } if *vendor_id != ticket.vendor_id
    ) {
        return Decision::Reject(Rejection::VendorMismatch);
    }

    if let Some(rejection) = status_rejection(ticket, now) {
        return Decision::Reject(rejection);
    }

    match actor {
        Actor::Vendor { vendor_id, .. } => Decision::Redeem(Redemption {
            vendor_id: vendor_id.clone(),
            redeemed_at: now,
            device,
        }),
        Actor::Player => Decision::Acknowledge(LastScan {
            at: now,
            by: ActorKind::Player,
        }),
    }
}

/// Why a ticket in its current state cannot be scanned, if anything.
///
/// Used when a conditional write loses: the store re-reads the ticket and
/// reports whatever state won.
#[must_use]
pub fn status_rejection(ticket: &Ticket, now: DateTime<Utc>) -> Option<Rejection> {
    match ticket.status {
        TicketStatus::Used { .. } => Some(Rejection::AlreadyUsed),
        TicketStatus::Expired => Some(Rejection::Expired),
        TicketStatus::Valid if ticket.is_expired_at(now) => Some(Rejection::Expired),
        TicketStatus::Valid => None,
    }
}

/// Apply a redemption in place if the ticket is still redeemable.
///
/// Returns `false` and leaves the ticket untouched otherwise. Callers must
/// hold whatever lock guards `ticket` for the whole call.
pub fn apply_redemption(ticket: &mut Ticket, redemption: &Redemption, now: DateTime<Utc>) -> bool {
    if status_rejection(ticket, now).is_some() {
        return false;
    }
    ticket.last_scan = Some(LastScan {
        at: redemption.redeemed_at,
        by: ActorKind::Vendor,
    });
    ticket.status = TicketStatus::Used {
        redemption: redemption.clone(),
    };
    true
}

/// Record a non-redeeming scan if the ticket is still valid.
pub fn apply_last_scan(ticket: &mut Ticket, scan: LastScan) -> bool {
    if !matches!(ticket.status, TicketStatus::Valid) {
        return false;
    }
    ticket.last_scan = Some(scan);
    true
}

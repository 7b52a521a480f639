//! Domain types for ticket scanning.
//!
//! Identifiers, the authoritative [`Ticket`] record with its tagged
//! [`TicketStatus`], the append-only [`ScanEvent`] audit record, and the
//! authenticated [`Caller`] handed to the core by the identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier and return the raw string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Opaque ticket identifier, generated at issuance.
    TicketId
);
string_id!(
    /// Identifier of a platform user (ticket owner or scanning actor).
    UserId
);
string_id!(
    /// Identifier of the vendor that issued (and may redeem) a ticket.
    VendorId
);
string_id!(
    /// Identifier of the game/draw a ticket belongs to.
    GameId
);

impl TicketId {
    /// Generate a fresh random ticket identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Error returned when parsing one of the lowercase wire enums fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// Which enum was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

// ============================================================================
// Actors and devices
// ============================================================================

/// Who initiated a scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    /// Ticket holder checking their own ticket
    Player,
    /// Vendor redeeming a ticket at the counter
    Vendor,
}

impl ActorKind {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Vendor => "vendor",
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player" => Ok(Self::Player),
            "vendor" => Ok(Self::Vendor),
            other => Err(UnknownVariant {
                kind: "actor kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Client surface a scan came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Browser
    Web,
    /// Native mobile app
    Mobile,
}

impl DeviceKind {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Mobile => "mobile",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(Self::Web),
            "mobile" => Ok(Self::Mobile),
            other => Err(UnknownVariant {
                kind: "device kind",
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// Ticket price in minor currency units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (cents, pesewas, ...)
    pub amount_minor: i64,
    /// ISO 4217 currency code
    pub currency: String,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub fn new(amount_minor: i64, currency: impl Into<String>) -> Self {
        Self {
            amount_minor,
            currency: currency.into(),
        }
    }
}

/// Promotional coupon attached to a ticket at purchase time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    /// Code shown to the player
    pub code: String,
    /// Optional human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Discount in minor units, if the coupon carries a fixed value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_minor: Option<i64>,
    /// Whether the coupon has already been consumed
    #[serde(default)]
    pub used: bool,
}

/// Record written once when a vendor redeems a ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    /// Vendor that redeemed the ticket
    pub vendor_id: VendorId,
    /// When the redemption happened
    pub redeemed_at: DateTime<Utc>,
    /// Device used for the redemption scan
    pub device: DeviceKind,
}

/// Most recent scan of a ticket, by anyone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastScan {
    /// When the scan happened
    pub at: DateTime<Utc>,
    /// Who scanned
    pub by: ActorKind,
}

/// Ticket status.
///
/// The redemption record only exists inside [`TicketStatus::Used`], so a
/// ticket can never carry a redemption while claiming to be valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TicketStatus {
    /// Issued and redeemable
    Valid,
    /// Redeemed by a vendor (terminal)
    Used {
        /// Immutable redemption record
        redemption: Redemption,
    },
    /// Explicitly expired (terminal)
    Expired,
}

impl TicketStatus {
    /// Storage/wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Used { .. } => "used",
            Self::Expired => "expired",
        }
    }

    /// Redemption record, present only for used tickets.
    #[must_use]
    pub const fn redemption(&self) -> Option<&Redemption> {
        match self {
            Self::Used { redemption } => Some(redemption),
            Self::Valid | Self::Expired => None,
        }
    }
}

/// The authoritative redeemable unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket identifier
    pub id: TicketId,
    /// User who bought the ticket
    pub owner_id: UserId,
    /// Vendor that issued the ticket
    pub vendor_id: VendorId,
    /// Game/draw the ticket belongs to
    pub game_id: GameId,
    /// Purchase price
    pub price: Money,
    /// Current status
    #[serde(flatten)]
    pub status: TicketStatus,
    /// Optional hard expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Most recent scan
    pub last_scan: Option<LastScan>,
    /// Attached coupon, if any
    pub coupon: Option<Coupon>,
    /// Issuance time
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Issue a new valid ticket.
    #[must_use]
    pub fn issue(
        id: TicketId,
        owner_id: UserId,
        vendor_id: VendorId,
        game_id: GameId,
        price: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            vendor_id,
            game_id,
            price,
            status: TicketStatus::Valid,
            expires_at: None,
            last_scan: None,
            coupon: None,
            created_at,
        }
    }

    /// Set a hard expiry.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Attach a coupon.
    #[must_use]
    pub fn with_coupon(mut self, coupon: Coupon) -> Self {
        self.coupon = Some(coupon);
        self
    }

    /// Whether the ticket counts as expired at `now`, either by explicit
    /// status or because its expiry has passed.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, TicketStatus::Expired)
            || self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Coupon that can still be handed to the player.
    #[must_use]
    pub fn unused_coupon(&self) -> Option<&Coupon> {
        self.coupon.as_ref().filter(|coupon| !coupon.used)
    }
}

// ============================================================================
// Scan outcomes and audit
// ============================================================================

/// Determinate result of a scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanResult {
    /// Vendor redeemed the ticket
    Validated,
    /// Player check, ticket usable
    Valid,
    /// Ticket was redeemed earlier
    AlreadyUsed,
    /// Ticket expired
    Expired,
    /// Not found, malformed, failed verification, or not authorized
    Invalid,
}

impl ScanResult {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validated => "VALIDATED",
            Self::Valid => "VALID",
            Self::AlreadyUsed => "ALREADY_USED",
            Self::Expired => "EXPIRED",
            Self::Invalid => "INVALID",
        }
    }

    /// Only a redemption or a successful player check count as success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Validated | Self::Valid)
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanResult {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VALIDATED" => Ok(Self::Validated),
            "VALID" => Ok(Self::Valid),
            "ALREADY_USED" => Ok(Self::AlreadyUsed),
            "EXPIRED" => Ok(Self::Expired),
            "INVALID" => Ok(Self::Invalid),
            other => Err(UnknownVariant {
                kind: "scan result",
                value: other.to_string(),
            }),
        }
    }
}

/// Append-only audit record, one per scan request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    /// Event identifier
    pub id: Uuid,
    /// Resolved ticket, absent when none could be extracted
    pub ticket_id: Option<TicketId>,
    /// Kind of actor that scanned
    pub scanned_by: ActorKind,
    /// Authenticated user that scanned
    pub user_id: UserId,
    /// Vendor on whose behalf the scan ran, for vendor scans
    pub vendor_id: Option<VendorId>,
    /// Client surface, absent when the request body could not be read
    pub device: Option<DeviceKind>,
    /// Client app version
    pub app_version: Option<String>,
    /// Outcome code
    pub result: ScanResult,
    /// Message returned to the client
    pub message: String,
    /// When the scan was processed
    pub scanned_at: DateTime<Utc>,
    /// Source IP
    pub ip_address: Option<IpAddr>,
    /// Request correlation id
    pub correlation_id: Option<Uuid>,
}

// ============================================================================
// Authenticated caller
// ============================================================================

/// Role granted to a caller by the identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular ticket holder
    Player,
    /// Vendor staff
    Vendor,
    /// Platform administrator
    Admin,
}

impl Role {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Vendor => "vendor",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player" => Ok(Self::Player),
            "vendor" => Ok(Self::Vendor),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// Authenticated caller, trusted as supplied by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Authenticated user
    pub user_id: UserId,
    /// Granted role
    pub role: Role,
    /// Vendor the user works for, when known
    pub vendor_id: Option<VendorId>,
}

impl Caller {
    /// Player caller.
    #[must_use]
    pub fn player(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Player,
            vendor_id: None,
        }
    }

    /// Vendor staff caller.
    #[must_use]
    pub fn vendor(user_id: impl Into<UserId>, vendor_id: impl Into<VendorId>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Vendor,
            vendor_id: Some(vendor_id.into()),
        }
    }

    /// Administrator caller.
    #[must_use]
    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
            vendor_id: None,
        }
    }

    /// Whether the caller holds elevated capability.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Vendor identity of the caller. Vendor accounts without an explicit
    /// vendor id act as the vendor named by their user id.
    #[must_use]
    pub fn vendor_identity(&self) -> Option<VendorId> {
        match (&self.vendor_id, self.role) {
            (Some(vendor_id), _) => Some(vendor_id.clone()),
            (None, Role::Vendor) => Some(VendorId::new(self.user_id.as_str())),
            (None, Role::Player | Role::Admin) => None,
        }
    }

    /// Actor kind implied by the role, for scans whose request did not say.
    #[must_use]
    pub const fn actor_kind(&self) -> ActorKind {
        match self.role {
            Role::Player => ActorKind::Player,
            Role::Vendor | Role::Admin => ActorKind::Vendor,
        }
    }
}

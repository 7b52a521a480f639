//! # Ticket Scan Core
//!
//! Issuance and scan-validation core for QR tickets.
//!
//! ## Pure phase
//!
//! - [`token`]: QR payload codec
//! - [`signature`]: integrity hash and transport HMAC, constant-time verification
//! - [`validator`]: freshness window and hash check
//! - [`redemption`]: the `valid → used` state machine
//!
//! ## Effectful phase
//!
//! - [`store`]: ticket store and scan audit log traits
//! - [`identity`]: bearer token resolution
//! - [`scan`]: the scan orchestrator
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ticket_scan_core::environment::SystemClock;
//! use ticket_scan_core::signature::{SignatureEngine, SigningSecrets};
//! use ticket_scan_core::token::{QrPayload, TokenCodec};
//! use ticket_scan_core::types::TicketId;
//! use ticket_scan_core::validator::PayloadValidator;
//!
//! let engine = Arc::new(SignatureEngine::new(&SigningSecrets::shared("secret")).unwrap());
//! let codec = TokenCodec::new(Arc::clone(&engine), Arc::new(SystemClock));
//! let validator = PayloadValidator::new(engine, Arc::new(SystemClock));
//!
//! let qr = codec.encode(&TicketId::new("ticket-1")).serialize();
//! let scanned = QrPayload::deserialize(&qr).unwrap();
//! assert!(validator.validate(&scanned));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod environment;
pub mod identity;
pub mod redemption;
pub mod scan;
pub mod signature;
pub mod store;
pub mod token;
pub mod types;
pub mod validator;

pub use environment::{Clock, SystemClock};
pub use identity::{IdentityError, IdentityProvider};
pub use scan::{
    Disposition, ScanContext, ScanError, ScanOrchestrator, ScanReport, ScanRequest, ScanResponse,
};
pub use signature::{SignatureEngine, SignatureError, SigningSecrets};
pub use store::{ScanEventLog, StoreError, StoreFuture, TicketStore, Transition};
pub use token::{QrPayload, TokenCodec};
pub use types::{
    ActorKind, Caller, Coupon, DeviceKind, GameId, LastScan, Money, Redemption, Role, ScanEvent,
    ScanResult, Ticket, TicketId, TicketStatus, UserId, VendorId,
};
pub use validator::{PayloadRejection, PayloadValidator};

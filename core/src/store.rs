//! Storage abstractions for tickets and scan audit events.
//!
//! # Implementations
//!
//! - `PostgresTicketStore` / `PostgresScanEventLog` (in `ticket-scan-postgres`):
//!   production, conditional `UPDATE ... RETURNING` for transitions
//! - `InMemoryTicketStore` / `InMemoryScanEventLog` (in `ticket-scan-testing`):
//!   fast, deterministic tests
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! orchestrator can hold `Arc<dyn TicketStore>` and `Arc<dyn ScanEventLog>`.

use crate::types::{LastScan, Redemption, ScanEvent, Ticket, TicketId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors raised by a backing store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// Stored data could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Insert of an id that already exists.
    #[error("Duplicate ticket: {0}")]
    Duplicate(TicketId),

    /// Store did not answer in time. The caller must assume nothing changed.
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of a conditional transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Precondition held; the updated ticket.
    Applied(Ticket),
    /// Precondition failed; the ticket as it is now.
    Rejected(Ticket),
    /// No such ticket.
    NotFound,
}

/// Authoritative ticket storage.
///
/// Only the scan orchestrator mutates tickets, and only through the two
/// conditional transitions below. Tickets are never deleted.
pub trait TicketStore: Send + Sync {
    /// Load a ticket.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store fails.
    fn get<'a>(&'a self, id: &'a TicketId) -> StoreFuture<'a, Option<Ticket>>;

    /// Persist a newly issued ticket.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the id exists, or another
    /// [`StoreError`] if the backing store fails.
    fn insert(&self, ticket: Ticket) -> StoreFuture<'_, ()>;

    /// Atomically move a ticket from `valid` (and unexpired at `now`) to
    /// `used`, writing the redemption record and last-scan fields.
    ///
    /// At most one of any number of concurrent calls for the same id
    /// returns [`Transition::Applied`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store fails.
    fn mark_used<'a>(
        &'a self,
        id: &'a TicketId,
        redemption: &'a Redemption,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Transition>;

    /// Update last-scan fields, provided the ticket is still `valid`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store fails.
    fn touch_last_scan<'a>(&'a self, id: &'a TicketId, scan: LastScan)
    -> StoreFuture<'a, Transition>;
}

/// Append-only audit log.
pub trait ScanEventLog: Send + Sync {
    /// Append one event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store fails.
    fn append(&self, event: ScanEvent) -> StoreFuture<'_, ()>;

    /// Events recorded for a ticket, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store fails.
    fn list_for_ticket<'a>(&'a self, id: &'a TicketId) -> StoreFuture<'a, Vec<ScanEvent>>;
}

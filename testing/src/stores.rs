//! In-memory ticket store and scan event log.
//!
//! Both fakes hold their data behind one mutex, so every transition is a
//! check-and-set inside a single critical section: the same guarantee the
//! Postgres conditional `UPDATE` gives.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ticket_scan_core::redemption::{apply_last_scan, apply_redemption};
use ticket_scan_core::store::{ScanEventLog, StoreError, StoreFuture, TicketStore, Transition};
use ticket_scan_core::types::{LastScan, Redemption, ScanEvent, Ticket, TicketId};

/// Failure injection shared by both fakes.
#[derive(Debug, Default)]
struct Faults {
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl Faults {
    async fn enter(&self) -> Result<(), StoreError> {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".to_string()));
        }
        Ok(())
    }
}

/// In-memory ticket store for fast, deterministic testing.
///
/// # Example
///
/// ```
/// use ticket_scan_testing::{fixtures, InMemoryTicketStore};
/// use ticket_scan_core::store::TicketStore;
/// use ticket_scan_core::types::TicketId;
///
/// # tokio_test::block_on(async {
/// let store = InMemoryTicketStore::new();
/// store.put(fixtures::ticket("t-1", "vendor-a"));
///
/// let ticket = store.get(&TicketId::new("t-1")).await.unwrap();
/// assert!(ticket.is_some());
/// # });
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryTicketStore {
    tickets: Arc<Mutex<HashMap<TicketId, Ticket>>>,
    faults: Arc<Faults>,
}

impl InMemoryTicketStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a ticket without going through the trait.
    pub fn put(&self, ticket: Ticket) {
        self.tickets
            .lock()
            .unwrap()
            .insert(ticket.id.clone(), ticket);
    }

    /// Current copy of a ticket.
    #[must_use]
    pub fn snapshot(&self, id: &str) -> Option<Ticket> {
        self.tickets
            .lock()
            .unwrap()
            .get(&TicketId::new(id))
            .cloned()
    }

    /// Number of stored tickets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.lock().unwrap().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.lock().unwrap().is_empty()
    }

    /// Make every subsequent call fail with [`StoreError::Database`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every subsequent call.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.faults.latency.lock().unwrap() = latency;
    }

    fn transition(&self, id: &TicketId, apply: impl FnOnce(&mut Ticket) -> bool) -> Transition {
        let mut tickets = self.tickets.lock().unwrap();
        let Some(ticket) = tickets.get_mut(id) else {
            return Transition::NotFound;
        };
        if apply(ticket) {
            Transition::Applied(ticket.clone())
        } else {
            Transition::Rejected(ticket.clone())
        }
    }
}

impl TicketStore for InMemoryTicketStore {
    fn get<'a>(&'a self, id: &'a TicketId) -> StoreFuture<'a, Option<Ticket>> {
        Box::pin(async move {
            self.faults.enter().await?;
            Ok(self.tickets.lock().unwrap().get(id).cloned())
        })
    }

    fn insert(&self, ticket: Ticket) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.faults.enter().await?;
            let mut tickets = self.tickets.lock().unwrap();
            if tickets.contains_key(&ticket.id) {
                return Err(StoreError::Duplicate(ticket.id));
            }
            tickets.insert(ticket.id.clone(), ticket);
            Ok(())
        })
    }

    fn mark_used<'a>(
        &'a self,
        id: &'a TicketId,
        redemption: &'a Redemption,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Transition> {
        Box::pin(async move {
            self.faults.enter().await?;
            Ok(self.transition(id, |ticket| apply_redemption(ticket, redemption, now)))
        })
    }

    fn touch_last_scan<'a>(
        &'a self,
        id: &'a TicketId,
        scan: LastScan,
    ) -> StoreFuture<'a, Transition> {
        Box::pin(async move {
            self.faults.enter().await?;
            Ok(self.transition(id, |ticket| apply_last_scan(ticket, scan)))
        })
    }
}

/// In-memory append-only scan event log.
#[derive(Clone, Debug, Default)]
pub struct InMemoryScanEventLog {
    events: Arc<Mutex<Vec<ScanEvent>>>,
    faults: Arc<Faults>,
}

impl InMemoryScanEventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in append order.
    #[must_use]
    pub fn events(&self) -> Vec<ScanEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }

    /// Make every subsequent append fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl ScanEventLog for InMemoryScanEventLog {
    fn append(&self, event: ScanEvent) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.faults.enter().await?;
            self.events.lock().unwrap().push(event);
            Ok(())
        })
    }

    fn list_for_ticket<'a>(&'a self, id: &'a TicketId) -> StoreFuture<'a, Vec<ScanEvent>> {
        Box::pin(async move {
            self.faults.enter().await?;
            Ok(self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|event| event.ticket_id.as_ref() == Some(id))
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::fixtures;
    use ticket_scan_core::types::{ActorKind, DeviceKind, TicketStatus, VendorId};

    fn redemption(vendor: &str, now: DateTime<Utc>) -> Redemption {
        Redemption {
            vendor_id: VendorId::new(vendor),
            redeemed_at: now,
            device: DeviceKind::Mobile,
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let store = InMemoryTicketStore::new();
        let ticket = fixtures::ticket("t-1", "vendor-a");

        store.insert(ticket.clone()).await.unwrap();
        let err = store.insert(ticket).await.unwrap_err();
        assert_eq!(err, StoreError::Duplicate(TicketId::new("t-1")));
    }

    #[tokio::test]
    async fn test_mark_used_once() {
        let store = InMemoryTicketStore::new();
        store.put(fixtures::ticket("t-1", "vendor-a"));
        let id = TicketId::new("t-1");
        let now = fixtures::now();

        let first = store
            .mark_used(&id, &redemption("vendor-a", now), now)
            .await
            .unwrap();
        assert!(matches!(first, Transition::Applied(_)));

        let second = store
            .mark_used(&id, &redemption("vendor-a", now), now)
            .await
            .unwrap();
        let Transition::Rejected(current) = second else {
            panic!("expected rejection, got {second:?}");
        };
        assert!(matches!(current.status, TicketStatus::Used { .. }));
    }

    #[tokio::test]
    async fn test_mark_used_unknown_ticket() {
        let store = InMemoryTicketStore::new();
        let now = fixtures::now();
        let result = store
            .mark_used(&TicketId::new("nope"), &redemption("v", now), now)
            .await
            .unwrap();
        assert_eq!(result, Transition::NotFound);
    }

    #[tokio::test]
    async fn test_touch_last_scan_keeps_status() {
        let store = InMemoryTicketStore::new();
        store.put(fixtures::ticket("t-1", "vendor-a"));
        let scan = LastScan {
            at: fixtures::now(),
            by: ActorKind::Player,
        };

        let result = store
            .touch_last_scan(&TicketId::new("t-1"), scan)
            .await
            .unwrap();
        let Transition::Applied(ticket) = result else {
            panic!("expected applied, got {result:?}");
        };
        assert_eq!(ticket.status, TicketStatus::Valid);
        assert_eq!(ticket.last_scan, Some(scan));
    }

    #[tokio::test]
    async fn test_concurrent_redemptions_single_winner() {
        let store = InMemoryTicketStore::new();
        store.put(fixtures::ticket("t-1", "vendor-a"));
        let id = TicketId::new("t-1");
        let now = fixtures::now();
        let r = redemption("vendor-a", now);

        let (a, b) = tokio::join!(
            store.mark_used(&id, &r, now),
            store.mark_used(&id, &r, now)
        );
        let applied = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(|t| matches!(t, Transition::Applied(_)))
            .count();
        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = InMemoryTicketStore::new();
        store.set_unavailable(true);
        let result = store.get(&TicketId::new("t-1")).await;
        assert!(matches!(result, Err(StoreError::Database(_))));
    }

    #[tokio::test]
    async fn test_event_log_filters_by_ticket() {
        let log = InMemoryScanEventLog::new();
        log.append(fixtures::scan_event(Some("t-1"))).await.unwrap();
        log.append(fixtures::scan_event(Some("t-2"))).await.unwrap();
        log.append(fixtures::scan_event(None)).await.unwrap();

        let events = log.list_for_ticket(&TicketId::new("t-1")).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(log.len(), 3);
    }
}

//! # Ticket Scan Testing
//!
//! Testing utilities for the ticket scan workspace.
//!
//! This crate provides:
//! - [`FixedClock`]: deterministic, manually advanced time
//! - [`InMemoryTicketStore`] / [`InMemoryScanEventLog`]: fast store fakes
//!   with failure and latency injection
//! - [`StaticIdentityProvider`]: token → caller table
//! - [`fixtures`]: ready-made engines, tickets and requests
//! - [`properties`]: proptest strategies for domain values
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ticket_scan_core::ScanOrchestrator;
//! use ticket_scan_testing::{fixtures, test_clock, InMemoryScanEventLog, InMemoryTicketStore};
//!
//! let store = InMemoryTicketStore::new();
//! store.put(fixtures::ticket("t-1", "vendor-a"));
//!
//! let orchestrator = ScanOrchestrator::new(
//!     Arc::new(store),
//!     Arc::new(InMemoryScanEventLog::new()),
//!     Arc::new(fixtures::engine()),
//!     Arc::new(test_clock()),
//! );
//! # let _ = orchestrator;
//! ```

pub mod fixtures;
pub mod identity;
pub mod stores;

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use ticket_scan_core::environment::Clock;

pub use identity::StaticIdentityProvider;
pub use stores::{InMemoryScanEventLog, InMemoryTicketStore};

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, Mutex, PoisonError, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until explicitly advanced. Clones share the
    /// same time, so a test can keep a handle after giving one away.
    ///
    /// # Example
    ///
    /// ```
    /// use ticket_scan_testing::mocks::FixedClock;
    /// use ticket_scan_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// assert_eq!(time1, clock.now());
    ///
    /// clock.advance(Duration::hours(1));
    /// assert_eq!(clock.now() - time1, Duration::hours(1));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward (or backward, for negative durations).
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time.
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// Ticket identifiers: UUID-like and short human-typed forms.
    pub fn ticket_id() -> impl Strategy<Value = String> {
        prop_oneof![
            "[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}",
            "[A-Za-z0-9_-]{1,32}",
        ]
    }

    /// Issuance timestamps (epoch ms) between 2020 and 2040.
    pub fn issued_at() -> impl Strategy<Value = i64> {
        1_577_836_800_000_i64..2_208_988_800_000_i64
    }

    /// Arbitrary non-empty secrets.
    pub fn secret() -> impl Strategy<Value = String> {
        "[ -~]{1,64}"
    }
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from many tests; only the first call takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticket_scan=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(clock.now_millis(), 1_735_689_600_000);
    }

    #[test]
    fn test_clones_share_time() {
        let clock = test_clock();
        let handle = clock.clone();
        handle.advance(Duration::minutes(5));
        assert_eq!(clock.now(), handle.now());
    }
}

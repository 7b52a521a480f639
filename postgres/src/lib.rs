//! `PostgreSQL` storage for ticket scanning.
//!
//! This crate provides the production implementations of the storage traits
//! from `ticket-scan-core`:
//!
//! - [`PostgresTicketStore`]: tickets, with `valid → used` as a single
//!   conditional `UPDATE ... RETURNING`
//! - [`PostgresScanEventLog`]: append-only scan audit trail
//! - [`PostgresSessionStore`]: bearer token → caller lookup
//!
//! # Example
//!
//! ```no_run
//! use ticket_scan_postgres::{connect, migrate, PoolSettings, PostgresTicketStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = connect("postgres://localhost/tickets", &PoolSettings::default()).await?;
//! migrate(&pool).await?;
//! let tickets = PostgresTicketStore::new(pool);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod events;
mod sessions;
mod tickets;

pub use events::PostgresScanEventLog;
pub use sessions::PostgresSessionStore;
pub use tickets::PostgresTicketStore;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use ticket_scan_core::store::StoreError;

/// Connection pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Upper bound on open connections
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// How long to wait for a free connection
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the database cannot be reached.
pub async fn connect(database_url: &str, settings: &PoolSettings) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect(database_url)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))
}

/// Apply the bundled migrations (`tickets`, `scan_events`, `sessions`).
///
/// # Errors
///
/// Returns [`StoreError::Database`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))
}

/// Round-trip a trivial query, for readiness probes.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|e| StoreError::Database(format!("Ping failed: {e}")))
}

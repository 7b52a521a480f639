//! `PostgreSQL` scan audit log.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use ticket_scan_core::store::{ScanEventLog, StoreError, StoreFuture};
use ticket_scan_core::types::{DeviceKind, ScanEvent, TicketId, UserId, VendorId};
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct ScanEventRow {
    id: Uuid,
    ticket_id: Option<String>,
    scanned_by: String,
    user_id: String,
    vendor_id: Option<String>,
    device: Option<String>,
    app_version: Option<String>,
    result: String,
    message: String,
    scanned_at: DateTime<Utc>,
    ip_address: Option<String>,
    correlation_id: Option<Uuid>,
}

impl TryFrom<ScanEventRow> for ScanEvent {
    type Error = StoreError;

    fn try_from(row: ScanEventRow) -> Result<Self, Self::Error> {
        let invalid = |e: ticket_scan_core::types::UnknownVariant| {
            StoreError::Serialization(format!("Invalid scan event {}: {e}", row.id))
        };
        Ok(Self {
            id: row.id,
            ticket_id: row.ticket_id.map(TicketId::new),
            scanned_by: row.scanned_by.parse().map_err(invalid)?,
            user_id: UserId::new(row.user_id),
            vendor_id: row.vendor_id.map(VendorId::new),
            device: row
                .device
                .map(|device| device.parse::<DeviceKind>())
                .transpose()
                .map_err(invalid)?,
            app_version: row.app_version,
            result: row.result.parse().map_err(invalid)?,
            message: row.message,
            scanned_at: row.scanned_at,
            ip_address: row.ip_address.and_then(|ip| ip.parse().ok()),
            correlation_id: row.correlation_id,
        })
    }
}

/// Append-only audit log backed by the `scan_events` table.
#[derive(Clone, Debug)]
pub struct PostgresScanEventLog {
    pool: PgPool,
}

impl PostgresScanEventLog {
    /// Create a log over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ScanEventLog for PostgresScanEventLog {
    fn append(&self, event: ScanEvent) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO scan_events (
                    id, ticket_id, scanned_by, user_id, vendor_id, device, app_version,
                    result, message, scanned_at, ip_address, correlation_id
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ",
            )
            .bind(event.id)
            .bind(event.ticket_id.as_ref().map(TicketId::as_str))
            .bind(event.scanned_by.as_str())
            .bind(event.user_id.as_str())
            .bind(event.vendor_id.as_ref().map(VendorId::as_str))
            .bind(event.device.map(DeviceKind::as_str))
            .bind(&event.app_version)
            .bind(event.result.as_str())
            .bind(&event.message)
            .bind(event.scanned_at)
            .bind(event.ip_address.map(|ip| ip.to_string()))
            .bind(event.correlation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to append scan event: {e}")))?;
            Ok(())
        })
    }

    fn list_for_ticket<'a>(&'a self, id: &'a TicketId) -> StoreFuture<'a, Vec<ScanEvent>> {
        Box::pin(async move {
            let rows: Vec<ScanEventRow> = sqlx::query_as(
                r"
                SELECT id, ticket_id, scanned_by, user_id, vendor_id, device, app_version,
                       result, message, scanned_at, ip_address, correlation_id
                FROM scan_events
                WHERE ticket_id = $1
                ORDER BY seq
                ",
            )
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to list scan events: {e}")))?;

            rows.into_iter().map(ScanEvent::try_from).collect()
        })
    }
}

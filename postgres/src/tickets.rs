//! `PostgreSQL` ticket store.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use ticket_scan_core::store::{StoreError, StoreFuture, TicketStore, Transition};
use ticket_scan_core::types::{
    ActorKind, Coupon, DeviceKind, GameId, LastScan, Money, Redemption, Ticket, TicketId,
    TicketStatus, UserId, VendorId,
};

macro_rules! ticket_columns {
    () => {
        "id, owner_id, vendor_id, game_id, price_minor, currency, status, expires_at, \
         last_scanned_at, last_scanned_by, redeemed_by_vendor, redeemed_at, redeemed_device, \
         coupon, created_at"
    };
}

const SELECT_TICKET: &str = concat!("SELECT ", ticket_columns!(), " FROM tickets WHERE id = $1");

const INSERT_TICKET: &str = concat!(
    "INSERT INTO tickets (",
    ticket_columns!(),
    ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
);

// Of any number of concurrent redemptions, exactly one matches status = 'valid'.
const MARK_USED: &str = concat!(
    "UPDATE tickets SET status = 'used', redeemed_by_vendor = $2, redeemed_at = $3, ",
    "redeemed_device = $4, last_scanned_at = $3, last_scanned_by = 'vendor' ",
    "WHERE id = $1 AND status = 'valid' AND (expires_at IS NULL OR expires_at > $5) ",
    "RETURNING ",
    ticket_columns!()
);

const TOUCH_LAST_SCAN: &str = concat!(
    "UPDATE tickets SET last_scanned_at = $2, last_scanned_by = $3 ",
    "WHERE id = $1 AND status = 'valid' ",
    "RETURNING ",
    ticket_columns!()
);

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: String,
    owner_id: String,
    vendor_id: String,
    game_id: String,
    price_minor: i64,
    currency: String,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    last_scanned_at: Option<DateTime<Utc>>,
    last_scanned_by: Option<String>,
    redeemed_by_vendor: Option<String>,
    redeemed_at: Option<DateTime<Utc>>,
    redeemed_device: Option<String>,
    coupon: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = StoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "valid" => TicketStatus::Valid,
            "expired" => TicketStatus::Expired,
            "used" => {
                let (Some(vendor_id), Some(redeemed_at), Some(device)) =
                    (row.redeemed_by_vendor, row.redeemed_at, row.redeemed_device)
                else {
                    return Err(StoreError::Serialization(format!(
                        "Ticket {} is used but has no redemption record",
                        row.id
                    )));
                };
                TicketStatus::Used {
                    redemption: Redemption {
                        vendor_id: VendorId::new(vendor_id),
                        redeemed_at,
                        device: parse_column(&device)?,
                    },
                }
            }
            other => {
                return Err(StoreError::Serialization(format!(
                    "Invalid ticket status: {other}"
                )));
            }
        };

        let last_scan = match (row.last_scanned_at, row.last_scanned_by) {
            (Some(at), Some(by)) => Some(LastScan {
                at,
                by: parse_column::<ActorKind>(&by)?,
            }),
            _ => None,
        };

        let coupon = row
            .coupon
            .map(serde_json::from_value::<Coupon>)
            .transpose()
            .map_err(|e| StoreError::Serialization(format!("Invalid coupon: {e}")))?;

        Ok(Self {
            id: TicketId::new(row.id),
            owner_id: UserId::new(row.owner_id),
            vendor_id: VendorId::new(row.vendor_id),
            game_id: GameId::new(row.game_id),
            price: Money::new(row.price_minor, row.currency),
            status,
            expires_at: row.expires_at,
            last_scan,
            coupon,
            created_at: row.created_at,
        })
    }
}

fn parse_column<T>(value: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| StoreError::Serialization(format!("{e}")))
}

fn database_error(action: &str, error: &sqlx::Error) -> StoreError {
    StoreError::Database(format!("Failed to {action}: {error}"))
}

/// Ticket store backed by the `tickets` table.
#[derive(Clone, Debug)]
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch(&self, id: &TicketId) -> Result<Option<Ticket>, StoreError> {
        let row: Option<TicketRow> = sqlx::query_as(SELECT_TICKET)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database_error("load ticket", &e))?;
        row.map(Ticket::try_from).transpose()
    }

    /// Turn the `RETURNING` row of a conditional update into a transition.
    /// No row means the precondition failed, so report the current state.
    async fn settle(
        &self,
        id: &TicketId,
        updated: Option<TicketRow>,
    ) -> Result<Transition, StoreError> {
        if let Some(row) = updated {
            return Ok(Transition::Applied(Ticket::try_from(row)?));
        }
        metrics::counter!("ticket_store_transition_conflicts_total").increment(1);
        Ok(match self.fetch(id).await? {
            Some(current) => Transition::Rejected(current),
            None => Transition::NotFound,
        })
    }
}

impl TicketStore for PostgresTicketStore {
    fn get<'a>(&'a self, id: &'a TicketId) -> StoreFuture<'a, Option<Ticket>> {
        Box::pin(self.fetch(id))
    }

    fn insert(&self, ticket: Ticket) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let coupon = ticket
                .coupon
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| StoreError::Serialization(format!("Invalid coupon: {e}")))?;
            let redemption = ticket.status.redemption();

            sqlx::query(INSERT_TICKET)
                .bind(ticket.id.as_str())
                .bind(ticket.owner_id.as_str())
                .bind(ticket.vendor_id.as_str())
                .bind(ticket.game_id.as_str())
                .bind(ticket.price.amount_minor)
                .bind(&ticket.price.currency)
                .bind(ticket.status.as_str())
                .bind(ticket.expires_at)
                .bind(ticket.last_scan.map(|scan| scan.at))
                .bind(ticket.last_scan.map(|scan| scan.by.as_str()))
                .bind(redemption.map(|r| r.vendor_id.as_str()))
                .bind(redemption.map(|r| r.redeemed_at))
                .bind(redemption.map(|r| r.device.as_str()))
                .bind(coupon)
                .bind(ticket.created_at)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(db_err) = &e {
                        if db_err.is_unique_violation() {
                            return StoreError::Duplicate(ticket.id.clone());
                        }
                    }
                    database_error("insert ticket", &e)
                })?;

            tracing::debug!(ticket_id = %ticket.id, vendor_id = %ticket.vendor_id, "Ticket stored");
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
            let updated: Option<TicketRow> = sqlx::query_as(MARK_USED)
                .bind(id.as_str())
                .bind(redemption.vendor_id.as_str())
                .bind(redemption.redeemed_at)
                .bind(redemption.device.as_str())
                .bind(now)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| database_error("redeem ticket", &e))?;
            self.settle(id, updated).await
        })
    }

    fn touch_last_scan<'a>(
        &'a self,
        id: &'a TicketId,
        scan: LastScan,
    ) -> StoreFuture<'a, Transition> {
        Box::pin(async move {
            let updated: Option<TicketRow> = sqlx::query_as(TOUCH_LAST_SCAN)
                .bind(id.as_str())
                .bind(scan.at)
                .bind(scan.by.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| database_error("record scan", &e))?;
            self.settle(id, updated).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> TicketRow {
        TicketRow {
            id: "t-1".to_string(),
            owner_id: "u-1".to_string(),
            vendor_id: "v-1".to_string(),
            game_id: "g-1".to_string(),
            price_minor: 500,
            currency: "GHS".to_string(),
            status: status.to_string(),
            expires_at: None,
            last_scanned_at: None,
            last_scanned_by: None,
            redeemed_by_vendor: None,
            redeemed_at: None,
            redeemed_device: None,
            coupon: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_valid_row_converts() {
        let ticket = Ticket::try_from(row("valid"));
        assert!(matches!(ticket, Ok(Ticket { status: TicketStatus::Valid, .. })));
    }

    #[test]
    fn test_used_row_requires_redemption() {
        assert!(matches!(
            Ticket::try_from(row("used")),
            Err(StoreError::Serialization(_))
        ));

        let mut used = row("used");
        used.redeemed_by_vendor = Some("v-1".to_string());
        used.redeemed_at = Some(Utc::now());
        used.redeemed_device = Some("mobile".to_string());
        let ticket = Ticket::try_from(used);
        assert!(matches!(
            ticket.as_ref().map(|t| t.status.redemption().map(|r| r.device)),
            Ok(Some(DeviceKind::Mobile))
        ));
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(Ticket::try_from(row("lost")).is_err());
    }

    #[test]
    fn test_coupon_json_decodes() {
        let mut with_coupon = row("valid");
        with_coupon.coupon = Some(serde_json::json!({"code": "DRINK", "used": false}));
        let ticket = Ticket::try_from(with_coupon);
        assert_eq!(
            ticket.ok().and_then(|t| t.coupon).map(|c| c.code),
            Some("DRINK".to_string())
        );
    }

    #[test]
    fn test_conditional_update_guards_status_and_expiry() {
        assert!(MARK_USED.contains("status = 'valid'"));
        assert!(MARK_USED.contains("expires_at > $5"));
        assert!(TOUCH_LAST_SCAN.contains("status = 'valid'"));
    }
}

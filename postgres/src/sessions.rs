//! Session-backed identity provider.
//!
//! Bearer tokens are never stored. The `sessions` table is keyed by the
//! SHA-256 of the token, so a lookup is an indexed equality match on a
//! digest and a leaked table does not yield usable tokens.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::future::Future;
use std::pin::Pin;
use ticket_scan_core::identity::{IdentityError, IdentityProvider};
use ticket_scan_core::store::StoreError;
use ticket_scan_core::types::{Caller, Role, UserId, VendorId};

fn token_hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Resolves bearer tokens against the `sessions` table.
#[derive(Clone, Debug)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    /// Create a session store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a session for `token`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    pub async fn create(
        &self,
        token: &str,
        caller: &Caller,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO sessions (token_hash, user_id, role, vendor_id, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(token_hash(token))
        .bind(caller.user_id.as_str())
        .bind(caller.role.as_str())
        .bind(caller.vendor_id.as_ref().map(VendorId::as_str))
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to create session: {e}")))?;
        Ok(())
    }

    /// Revoke the session for `token`. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    pub async fn revoke(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE sessions SET revoked_at = now() WHERE token_hash = $1")
            .bind(token_hash(token))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to revoke session: {e}")))?;
        Ok(())
    }
}

impl IdentityProvider for PostgresSessionStore {
    fn authenticate<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Caller, IdentityError>> + Send + 'a>> {
        Box::pin(async move {
            let row: Option<(String, String, Option<String>)> = sqlx::query_as(
                r"
                SELECT user_id, role, vendor_id
                FROM sessions
                WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > now()
                ",
            )
            .bind(token_hash(token))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IdentityError::Backend(format!("Failed to load session: {e}")))?;

            let (user_id, role, vendor_id) = row.ok_or(IdentityError::InvalidToken)?;
            let role: Role = role
                .parse()
                .map_err(|e| IdentityError::Backend(format!("Invalid session role: {e}")))?;

            Ok(Caller {
                user_id: UserId::new(user_id),
                role,
                vendor_id: vendor_id.map(VendorId::new),
            })
        })
    }
}

//! Application state for the scan HTTP server.
//!
//! Cloned per request; every field is a cheap handle.

use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;
use ticket_scan_core::identity::IdentityProvider;
use ticket_scan_core::scan::ScanOrchestrator;
use ticket_scan_core::store::TicketStore;
use ticket_scan_core::token::TokenCodec;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Scan pipeline
    pub orchestrator: Arc<ScanOrchestrator>,
    /// QR issuance, including the signature engine for the transport HMAC
    pub codec: Arc<TokenCodec>,
    /// Ticket reads for the issuance endpoint
    pub tickets: Arc<dyn TicketStore>,
    /// Bearer token resolution
    pub identity: Arc<dyn IdentityProvider>,
    /// Database pool for readiness probes; `None` when running on in-memory stores
    pub pool: Option<PgPool>,
}

impl AppState {
    /// Create application state without a database pool.
    #[must_use]
    pub fn new(
        orchestrator: ScanOrchestrator,
        codec: TokenCodec,
        tickets: Arc<dyn TicketStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            codec: Arc::new(codec),
            tickets,
            identity,
            pool: None,
        }
    }

    /// Attach the pool checked by `/ready`.
    #[must_use]
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }
}

impl FromRef<AppState> for Arc<dyn IdentityProvider> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.identity)
    }
}

//! Caller authentication for scan and issuance endpoints.
//!
//! ```rust,ignore
//! async fn handler(AuthenticatedCaller(caller): AuthenticatedCaller) -> Result<(), AppError> {
//!     // caller was resolved from a live bearer token
//! }
//! ```

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::sync::Arc;
use ticket_scan_core::identity::IdentityProvider;
use ticket_scan_core::types::Caller;
use ticket_scan_web::{AppError, BearerToken};

/// Caller resolved from `Authorization: Bearer <token>`.
///
/// Rejects with 401 when the header is missing or the token is unknown,
/// and with 500 when the identity backend fails.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller(pub Caller);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedCaller
where
    Arc<dyn IdentityProvider>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let identity = Arc::<dyn IdentityProvider>::from_ref(state);

        let caller = identity.authenticate(&token).await.map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            AppError::from(e)
        })?;
        Ok(Self(caller))
    }
}

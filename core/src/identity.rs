//! Bearer token resolution.

use crate::types::Caller;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors raised while resolving a bearer token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Token unknown, revoked or expired.
    #[error("Invalid or expired session")]
    InvalidToken,

    /// Backing store failure.
    #[error("Identity backend error: {0}")]
    Backend(String),
}

/// Resolves `Authorization: Bearer` tokens into authenticated callers.
pub trait IdentityProvider: Send + Sync {
    /// Look up the caller a token belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidToken`] for unknown or expired
    /// tokens and [`IdentityError::Backend`] for infrastructure failures.
    fn authenticate<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Caller, IdentityError>> + Send + 'a>>;
}

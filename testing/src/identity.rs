//! Static identity provider.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use ticket_scan_core::identity::{IdentityError, IdentityProvider};
use ticket_scan_core::types::Caller;

/// Maps fixed bearer tokens to callers.
///
/// Used by handler tests and for local development without a session table.
#[derive(Clone, Debug, Default)]
pub struct StaticIdentityProvider {
    callers: Arc<RwLock<HashMap<String, Caller>>>,
}

impl StaticIdentityProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token.
    #[must_use]
    pub fn with(self, token: impl Into<String>, caller: Caller) -> Self {
        self.callers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), caller);
        self
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn authenticate<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Caller, IdentityError>> + Send + 'a>> {
        let caller = self
            .callers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned();
        Box::pin(async move { caller.ok_or(IdentityError::InvalidToken) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_and_unknown_tokens() {
        let provider = StaticIdentityProvider::new().with("vendor-token", Caller::vendor("staff", "v-1"));

        let caller = provider.authenticate("vendor-token").await;
        assert_eq!(caller, Ok(Caller::vendor("staff", "v-1")));
        assert_eq!(
            provider.authenticate("other").await,
            Err(IdentityError::InvalidToken)
        );
    }
}

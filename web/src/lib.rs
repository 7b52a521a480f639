//! Axum boundary for ticket scanning.
//!
//! Handlers in `ticket-scan-server` stay thin: they extract the caller and
//! request context with the types here, call the scan orchestrator, and map
//! the outcome to a response.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        HTTP shell (this crate)          │  ← extractors, AppError
//! │  - bearer token, client IP, corr. id    │  ← correlation middleware
//! ├─────────────────────────────────────────┤
//! │        ticket-scan-core                 │
//! │  - decode → verify → redeem → audit     │
//! └─────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod middleware;

pub use error::AppError;
pub use extractors::{BearerToken, ClientIp, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

//! HTTP server for QR ticket scanning.
//!
//! Wires the `ticket-scan-core` pipeline to axum:
//!
//! - [`config`]: environment configuration
//! - [`auth`]: bearer token → caller
//! - [`api`]: scan and QR issuance handlers
//! - [`server`]: state, router, probes
//! - [`metrics`]: Prometheus exporter

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod auth;
pub mod config;
pub mod metrics;
pub mod server;

pub use config::Config;
pub use server::{AppState, build_router};

//! Ticket scan HTTP server.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use ticket_scan_core::environment::{Clock, SystemClock};
use ticket_scan_core::scan::ScanOrchestrator;
use ticket_scan_core::signature::SignatureEngine;
use ticket_scan_core::token::TokenCodec;
use ticket_scan_postgres::{PostgresScanEventLog, PostgresSessionStore, PostgresTicketStore};
use ticket_scan_server::{AppState, Config, build_router, metrics};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file (if present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticket_scan=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ticket scan server");

    let config = Config::from_env();
    for warning in config.insecure_defaults() {
        warn!("{warning}");
    }
    info!(
        http = %config.http_addr(),
        metrics = %config.metrics_addr(),
        max_age_secs = config.signing.max_age_secs,
        store_timeout_ms = config.scan.store_timeout_ms,
        "Configuration loaded"
    );

    metrics::install_exporter(config.metrics_addr().parse()?)?;

    info!("Connecting to database...");
    let pool = ticket_scan_postgres::connect(&config.postgres.url, &config.pool_settings()).await?;
    ticket_scan_postgres::migrate(&pool).await?;
    info!("Database ready");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = Arc::new(SignatureEngine::new(&config.signing_secrets())?);
    let tickets = Arc::new(PostgresTicketStore::new(pool.clone()));
    let events = Arc::new(PostgresScanEventLog::new(pool.clone()));
    let sessions = Arc::new(PostgresSessionStore::new(pool.clone()));

    let orchestrator = ScanOrchestrator::new(
        tickets.clone(),
        events,
        Arc::clone(&engine),
        Arc::clone(&clock),
    )
    .with_max_age(config.max_age())
    .with_store_timeout(config.store_timeout());
    let codec = TokenCodec::new(engine, clock);

    let state = AppState::new(orchestrator, codec, tickets, sessions).with_pool(pool);
    let app = build_router(state);

    let addr = config.http_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    let (stopping_tx, mut stopping_rx) = watch::channel(false);
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = stopping_tx.send(true);
    })
    .into_future();

    let grace = Duration::from_secs(config.server.shutdown_timeout);
    let deadline = async move {
        if stopping_rx.wait_for(|stopping| *stopping).await.is_ok() {
            tokio::time::sleep(grace).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => result?,
        () = deadline => warn!(timeout_secs = grace.as_secs(), "Shutdown timed out, dropping open connections"),
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}

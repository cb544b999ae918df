//! `cert-relay`: publishes certificate renewal events to RabbitMQ.

use std::sync::Arc;

use amqp_link::{ConnectionManager, LapinConnector};
use anyhow::{Context, Result};
use relay_runtime::{router, RelayConfig};
use relay_telemetry::{init_telemetry, TelemetryConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry =
        init_telemetry(&TelemetryConfig::from_env()).context("Failed to initialize telemetry")?;

    let config = RelayConfig::from_env().context("Invalid relay configuration")?;
    info!(
        broker = %config.link.redacted_url(),
        http_addr = %config.http_addr,
        max_attempts = config.link.backoff().max_attempts,
        "Starting cert-relay v{}",
        env!("CARGO_PKG_VERSION")
    );

    let manager = ConnectionManager::connect(config.link.clone(), LapinConnector::new())
        .await
        .context("Failed to connect to RabbitMQ")?;

    let shutdown = CancellationToken::new();
    let app = router(Arc::clone(&manager), shutdown.clone());

    let listener = TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_addr))?;
    info!(addr = %config.http_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("HTTP server error")?;

    if let Err(e) = manager.shutdown().await {
        error!(error = %e, "Broker link did not shut down cleanly");
    }
    info!("cert-relay stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM and cancel `token`.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }

    token.cancel();
}

//! Meridian server library.
//!
//! Provides a reusable `serve` function used by the `meridian` binary and by
//! integration tests that want to spin up the full HTTP stack in-process.

#![deny(missing_docs)]

mod error;
mod health;
mod logger;
mod tracing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use config::Config;
use telemetry::TelemetryGuard;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::tracing::TracingLayer;

pub use error::Error;

/// Configuration for serving Meridian.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to.
    pub listen_address: SocketAddr,
    /// The deserialized Meridian TOML configuration.
    pub config: Config,
    /// Cancellation token for graceful shutdown.
    pub shutdown_signal: CancellationToken,
    /// Log filter string (e.g. `"info"` or `"responses=debug"`).
    pub log_filter: String,
    /// The version string to log on startup.
    pub version: String,
    /// Optional oneshot sender to receive the bound address, useful when
    /// `listen_address`'s port is `0` and the actual port is assigned by the OS.
    pub bound_addr_sender: Option<tokio::sync::oneshot::Sender<SocketAddr>>,
}

/// Starts and runs the Meridian gateway with the provided configuration.
pub async fn serve(
    ServeConfig {
        listen_address,
        config,
        shutdown_signal,
        log_filter,
        version,
        bound_addr_sender,
    }: ServeConfig,
) -> anyhow::Result<()> {
    let _telemetry_guard = init_otel(&config, log_filter).await;

    log::info!("Meridian {version}");

    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {e}"))?;

    let responses_router = responses::router(&config)
        .await
        .map_err(|e| anyhow!("Failed to initialize Responses API router: {e}"))?;

    let mut app = Router::new().merge(
        responses_router.layer(TracingLayer::with_config(Arc::new(config.telemetry.clone()))),
    );

    if config.server.health.enabled {
        if let Some(listen) = config.server.health.listen {
            tokio::spawn(health::bind_health_endpoint(listen, config.server.health.clone()));
        } else {
            app = app.merge(Router::new().route(&config.server.health.path, axum::routing::get(health::health)));
        }
    }

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    if let Some(sender) = bound_addr_sender {
        sender
            .send(listener.local_addr()?)
            .expect("Failed to send back bound address.");
    }

    match &config.server.tls {
        Some(tls_config) => {
            let rustls_config = RustlsConfig::from_pem_file(&tls_config.certificate, &tls_config.key)
                .await
                .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

            log::info!("Responses API listening on https://{listen_address}");

            let server =
                axum_server::from_tcp_rustls(listener.into_std()?, rustls_config).serve(app.into_make_service());

            tokio::select! {
                result = server => {
                    result.map_err(|e| anyhow!("Failed to start HTTPS server: {e}"))?;
                }
                _ = shutdown_signal.cancelled() => {
                    log::info!("Received shutdown signal, shutting down gracefully...");
                }
            }
        }
        None => {
            log::info!("Responses API listening on http://{listen_address}");

            tokio::select! {
                result = axum::serve(listener, app.into_make_service()) => {
                    result.map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;
                }
                _ = shutdown_signal.cancelled() => {
                    log::info!("Received shutdown signal, shutting down gracefully...");
                }
            }
        }
    }

    Ok(())
}

async fn init_otel(config: &Config, log_filter: String) -> Option<TelemetryGuard> {
    match telemetry::init(&config.telemetry).await {
        Ok(guard) => {
            let otel_appender = guard.logs_appender().cloned();
            logger::init(&log_filter, otel_appender);

            Some(guard)
        }
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {e}");
            logger::init(&log_filter, None);

            None
        }
    }
}

//! Health check endpoint.

use axum::{Json, Router, routing::get};
use config::HealthConfig;
use serde::Serialize;
use std::net::SocketAddr;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Serves the health endpoint on its own listener, separate from the main router.
///
/// Used when `[server.health] listen` points at an address distinct from the
/// main `listen_address`, so health checks keep working even if the main
/// listener is saturated.
pub(crate) async fn bind_health_endpoint(listen: SocketAddr, health_config: HealthConfig) -> anyhow::Result<()> {
    let router = Router::new().route(&health_config.path, get(health));
    let listener = tokio::net::TcpListener::bind(listen).await?;

    log::info!("Health endpoint listening on http://{listen}{}", health_config.path);
    axum::serve(listener, router).await?;

    Ok(())
}

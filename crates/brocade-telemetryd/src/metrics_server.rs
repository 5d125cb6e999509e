//! HTTP server for the Prometheus metrics endpoint
//!
//! Serves `/metrics` in the Prometheus text format. The gauges are refreshed
//! by the poll loop; a scrape only encodes what is already there.

use crate::error::{Result, TelemetryError};
use crate::gauges::Gauges;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// Configuration for the metrics server
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Listen address (e.g., "[::]:9095" for all interfaces)
    pub listen_addr: SocketAddr,
}

impl MetricsServerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self { listen_addr }
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.port() == 0 {
            return Err(TelemetryError::Configuration(
                "metrics listen port must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

async fn metrics_handler(State(gauges): State<Arc<Gauges>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, TEXT_FORMAT)],
        gauges.render(),
    )
}

/// Router exposing `/metrics`
pub fn router(gauges: Arc<Gauges>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(gauges)
}

/// Metrics HTTP server
pub struct MetricsServer {
    pub config: MetricsServerConfig,
    gauges: Arc<Gauges>,
}

impl MetricsServer {
    pub fn new(config: MetricsServerConfig, gauges: Arc<Gauges>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, gauges })
    }

    /// Bind the listen address; fails when the port is taken
    pub async fn bind(self) -> Result<BoundMetricsServer> {
        let listener = tokio::net::TcpListener::bind(self.config.listen_addr)
            .await
            .map_err(|e| {
                TelemetryError::Other(format!(
                    "Failed to bind to {}: {}",
                    self.config.listen_addr, e
                ))
            })?;
        Ok(BoundMetricsServer {
            listener,
            gauges: self.gauges,
        })
    }
}

/// Metrics server holding its listening socket
pub struct BoundMetricsServer {
    listener: tokio::net::TcpListener,
    gauges: Arc<Gauges>,
}

impl BoundMetricsServer {
    pub async fn serve(self) -> Result<()> {
        if let Ok(addr) = self.listener.local_addr() {
            info!(listen_addr = %addr, "metrics server listening");
        }
        axum::serve(self.listener, router(self.gauges))
            .await
            .map_err(|e| TelemetryError::Other(format!("Server error: {}", e)))
    }
}

/// Bind the metrics server, then serve it in a background task.
///
/// Bind errors are returned here rather than from the task.
pub async fn spawn_metrics_server(
    gauges: Arc<Gauges>,
    listen_addr: SocketAddr,
) -> Result<tokio::task::JoinHandle<Result<()>>> {
    let server = MetricsServer::new(MetricsServerConfig::new(listen_addr), gauges)?
        .bind()
        .await?;
    Ok(tokio::spawn(server.serve()))
}

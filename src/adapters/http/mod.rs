//! HTTP Server - JSON Request Layer
//!
//! Serves the tracker's reads, forced refresh, settings and Prometheus
//! metrics via axum 0.7. Shuts down gracefully on the shared broadcast
//! shutdown signal.

pub mod routes;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::{info, instrument};

pub use routes::{create_router, ApiState};

/// Axum-based API server.
pub struct ApiServer {
    state: Arc<ApiState>,
    bind_address: String,
}

impl ApiServer {
    pub fn new(state: Arc<ApiState>, bind_address: impl Into<String>) -> Self {
        Self {
            state,
            bind_address: bind_address.into(),
        }
    }

    /// Serve until the shutdown signal fires.
    #[instrument(skip(self, shutdown_rx), fields(address = %self.bind_address))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = create_router(Arc::clone(&self.state));

        let listener = tokio::net::TcpListener::bind(&self.bind_address)
            .await
            .with_context(|| format!("Failed to bind {}", self.bind_address))?;

        info!("API server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

//! API Server Module
//!
//! Axum server exposing the webhook endpoint and a health check.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::{health_check, receive_webhook, ApiState};
use crate::router::EventRouter;

/// Webhook HTTP server
pub struct ApiServer {
    /// Listen port
    port: u16,
    /// Shared state
    state: Arc<ApiState>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(port: u16, router: Arc<EventRouter>) -> Self {
        Self {
            port,
            state: Arc::new(ApiState { router }),
        }
    }

    /// Start serving; runs until the process stops.
    pub async fn start(&self) -> Result<()> {
        let app = Router::new()
            .route("/wassenger-webhook", post(receive_webhook))
            .route("/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Followcare webhook server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start webhook server: {e}"))?;

        Ok(())
    }
}

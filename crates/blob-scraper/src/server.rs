// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! HTTP server exposing the registry to Prometheus.

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use scraper_utils::metrics::Registry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// The path on which Prometheus is expected to scrape. Any other path serves the same content.
pub const METRICS_PATH: &str = "/metrics";

/// Serves the metrics of a [`Registry`] in the Prometheus text exposition format.
#[derive(Debug, Clone)]
pub struct MetricsServer {
    registry: Registry,
}

impl MetricsServer {
    /// Creates a server exposing `registry`.
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// The routes of the server.
    pub fn router(&self) -> Router {
        Router::new()
            .route(METRICS_PATH, get(render_metrics))
            .fallback(render_metrics)
            .with_state(self.registry.clone())
    }

    /// Serves requests on `listener` until `cancel` is triggered, then waits for open
    /// connections to complete.
    pub async fn run(self, listener: TcpListener, cancel: CancellationToken) -> std::io::Result<()> {
        let address = listener.local_addr()?;
        tracing::info!(%address, "serving prometheus metrics");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await?;

        tracing::info!("metrics server stopped");
        Ok(())
    }
}

async fn render_metrics(State(registry): State<Registry>) -> Response {
    match registry.encode_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, Registry::text_content_type())],
            body,
        )
            .into_response(),
        Err(error) => {
            tracing::error!(?error, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
    }
}

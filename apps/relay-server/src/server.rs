//! HTTP Server implementation

use anyhow::{Context, Result};
use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;

use relay_webhook::create_webhook_router;

use crate::app::AppState;
use crate::cli::Args;

pub struct Server {
    args: Args,
    state: AppState,
}

impl Server {
    pub fn new(args: Args, state: AppState) -> Self {
        Self { args, state }
    }

    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.args.port));
        let app = build_http_router(&self.state);

        info!("HTTP server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("Failed to bind HTTP server")?;

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server error")?;

        Ok(())
    }
}

pub fn build_http_router(state: &AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(create_webhook_router(state.handler.clone()))
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No handler available; run until killed
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

// Route handlers

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "Slack completion relay",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

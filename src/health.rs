//! Liveness endpoint, independent of pipeline state.
use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    status: &'static str,
}

pub async fn live() -> Json<HealthReport> {
    Json(HealthReport { status: "healthy" })
}

pub fn router() -> Router {
    Router::new().route("/health", get(live))
}

pub async fn serve(bind: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind health listener on {bind}"))?;
    info!(%bind, "health endpoint listening");
    axum::serve(listener, router())
        .await
        .context("health server exited")
}

//! StreamSentry -- streaming anomaly detection over keyed sliding windows.
//!
//! This crate provides the per-key sliding-window statistics engine
//! (circular record buffers, mean / population-std computation, and the
//! point and batch anomaly policies) plus the HTTP ingest service on
//! top of it.

pub mod api;
pub mod features;
pub mod ingest;
pub mod policy;
pub mod stats;
pub mod window;

use anyhow::Result;
use std::sync::Arc;

/// Start the StreamSentry daemon: one ingest coordinator behind the
/// HTTP API. All window state is in memory and lives as long as the
/// process.
pub async fn serve(bind: &str, mode: policy::DetectionMode, capacity: usize) -> Result<()> {
    let coordinator = Arc::new(ingest::IngestCoordinator::new(mode, capacity));
    let state = api::state::AppState { coordinator };
    let app = api::router(state);

    let addr: std::net::SocketAddr = bind.parse()?;
    tracing::info!(%addr, ?mode, capacity, "StreamSentry listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

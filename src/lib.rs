//! pipelinehealth -- execution health and dependency readiness for scheduled
//! data pipelines.
//!
//! This crate reads an execution log (CSV or SQLite), answers status and
//! duration-statistics queries, and decides whether a pipeline's upstream
//! dependencies finished before it started.

pub mod analysis;
pub mod api;
pub mod config;
pub mod query;
pub mod storage;
pub mod telemetry;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::query::QueryService;

/// Start the HTTP API and serve until Ctrl-C.
pub async fn serve(config: &Config) -> Result<()> {
    let service = QueryService::from_config(config).with_context(|| {
        format!(
            "failed to open execution log at {}",
            config.source.path.display()
        )
    })?;

    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.server.bind))?;

    tracing::info!(
        source = %service.describe_source(),
        policy = %service.policy(),
        cache = config.source.cache_snapshots,
        "query service ready"
    );
    let app = api::router(api::state::AppState::new(service));

    tracing::info!(%addr, "pipelinehealth listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("pipelinehealth stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

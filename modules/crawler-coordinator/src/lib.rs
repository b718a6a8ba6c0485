//! Work queue coordinator (spec §4.E): an in-process, single-lock dispatcher
//! that partitions domains across workers, paces requests per domain, and
//! escalates repeat failures into a cooldown and then a pause. Exposed over
//! HTTP so workers (potentially separate processes) can share it; workers
//! that can't reach it degrade to direct `batch_claim_for_extraction` calls.

pub mod coordinator;
pub mod http;
pub mod lease;

pub use coordinator::{Coordinator, WorkBatch, WorkItem};
pub use lease::{CoordinatorStats, LeaseTable};

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

/// Binds the RPC surface and runs until a shutdown signal arrives, alongside
/// the background worker-timeout reclamation sweep.
pub async fn serve(coordinator: Arc<Coordinator>, host: &str, port: u16) -> Result<()> {
    let app = http::router(coordinator.clone());
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("crawl coordinator listening on {addr}");

    let sweep = tokio::spawn(coordinator.run_reclamation_sweep());

    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("coordinator shutting down");
        }
    }

    sweep.abort();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

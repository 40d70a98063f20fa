//! `forge serve`: REST API server with a periodic sweep of expired builds.

use std::time::Duration;

use anyhow::{Context, Result};
use console::style;

use crate::http;
use crate::state::AppState;

/// How often finished builds past their TTL are swept.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    println!(
        "  {} IdeaForge API listening on {}",
        style("⚡").bold(),
        style(format!("http://{addr}/api/v1")).cyan()
    );
    println!("  {}", style("Press Ctrl+C to stop").dim());

    let purger = tokio::spawn(purge_loop(state.clone()));
    let router = http::router::build_router(state);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    purger.abort();
    served?;

    println!("\n  Server stopped.");
    Ok(())
}

async fn purge_loop(state: AppState) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match state.builds.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => tracing::info!(purged, "expired builds purged"),
            Err(e) => tracing::warn!(error = %e, "build purge failed"),
        }
    }
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

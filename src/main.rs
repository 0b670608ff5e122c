//! Exam Data Manager server binary.

use std::time::Duration;

use exam_data_manager::api::{AppState, create_router};
use exam_data_manager::config::{ConfigLoader, LoggingConfig};
use exam_data_manager::jobs::JobTracker;
use exam_data_manager::storage;
use tokio::net::TcpListener;
use tokio::signal::{self, ctrl_c};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", logging.level))),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::from_env()?.into_config();
    init_tracing(&config.logging);

    info!(backend = ?config.storage.backend, "Opening document store");
    let opened = storage::open(&config.storage).await?;

    let shutdown = CancellationToken::new();
    let state = AppState::from_config(&config, opened.store, shutdown.clone())?;

    spawn_pruner(
        state.tracker().clone(),
        Duration::from_secs(config.ingestion.job_retention_secs),
        shutdown.clone(),
    );

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    let app = create_router(state);
    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_token.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(gateway) = opened.gateway {
        gateway.close().await;
    }
    info!("Server stopped");
    Ok(())
}

/// Drops finished jobs older than `retention`, checking once a minute.
fn spawn_pruner(tracker: JobTracker, retention: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let removed = tracker.prune_finished(retention).await;
                    if removed > 0 {
                        debug!(removed, "Pruned finished jobs");
                    }
                }
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        } else {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! # DealSource Pipeline Worker
//!
//! Contacts new vendor leads by SMS and follows up until they reply or the
//! follow-ups run out. Stops cleanly on `SIGINT` / `SIGTERM`.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/dealsource \
//! PIPELINE_POLL_INTERVAL_SECS=30 \
//! cargo run -p dealsource-worker
//! ```

use anyhow::Context;
use dealsource_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool},
};
use dealsource_worker::{
    config::WorkerConfig,
    pipeline::{gateway_from_config, PipelineService},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dealsource_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    std::panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %info, "Worker panicked");
    }));

    tracing::info!(
        "DealSource Pipeline Worker v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = WorkerConfig::from_env().context("Failed to load configuration")?;

    let pool = create_pool(config.database.clone())
        .await
        .context("Failed to connect to database")?;

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let gateway = gateway_from_config(&config.sms).context("Failed to set up SMS gateway")?;
    let service = PipelineService::new(pool.clone(), config.pipeline, gateway);
    let handle = service.start();

    shutdown_signal().await;
    service.stop();

    handle.await.context("Pipeline task failed")?;

    close_pool(pool).await;
    tracing::info!("Worker stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

//! # DealSource API Server
//!
//! HTTP backend for the DealSource dashboard and investor portal.
//!
//! ## Start-up
//!
//! 1. Load configuration from the environment (and `.env`)
//! 2. Connect the database pool and apply pending migrations
//! 3. Seed the bootstrap admin when `ADMIN_EMAIL` / `ADMIN_PASSWORD` are set
//! 4. Serve until `SIGINT` / `SIGTERM`
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/dealsource \
//! SESSION_SECRET=$(openssl rand -hex 32) \
//! cargo run -p dealsource-api
//! ```

use anyhow::Context;
use dealsource_api::{
    app::{build_router, AppState},
    config::Config,
};
use dealsource_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool},
    },
    seed::ensure_admin_user,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dealsource_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "DealSource API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = create_pool(config.database.clone())
        .await
        .context("Failed to connect to database")?;

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    if let Some(seed) = &config.admin_seed {
        ensure_admin_user(&pool, seed)
            .await
            .context("Failed to seed admin user")?;
    }

    let addr = config.bind_address();
    let state = AppState::new(pool.clone(), config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

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

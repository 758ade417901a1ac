//! # Teamboard API Server
//!
//! Project and task management API with admin and collaborator roles.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p teamboard-api
//! ```

use std::sync::Arc;

use anyhow::Context;
use teamboard_api::app::{build_router, AppState};
use teamboard_api::config::{Config, LogFormat};
use teamboard_shared::db::migrations;
use teamboard_shared::db::pool::{self, PoolSettings};
use teamboard_shared::repository::postgres::PgRepository;
use teamboard_shared::repository::RepositoryState;
use teamboard_shared::services::users::{BootstrapAdmin, UserService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.logging.format);

    tracing::info!(
        "Teamboard API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let settings =
        PoolSettings::new(config.database.url.clone()).max_connections(config.database.max_connections);
    let db_pool = migrations::prepare(&settings)
        .await
        .context("failed to prepare database")?;

    let repo: RepositoryState = Arc::new(PgRepository::new(db_pool.clone()));

    if let Some(seed) = &config.auth.bootstrap_admin {
        let users = UserService::new(repo.clone());
        match users.ensure_bootstrap_admin(&BootstrapAdmin::from(seed)).await? {
            Some(admin) => tracing::info!(user_id = admin.id, "Bootstrap admin created"),
            None => tracing::debug!("Admin already present, bootstrap skipped"),
        }
    }

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(repo, config));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool::close(db_pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "teamboard_api=debug,teamboard_shared=debug,tower_http=debug".into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Never resolves, so the server keeps running
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, exiting...");
}

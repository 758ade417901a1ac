/// Schema setup
///
/// The SQL lives in the workspace `migrations/` directory and is compiled
/// into the binary. [`prepare`] is what the server runs at startup: create
/// the database if needed, connect, then migrate.

use sqlx::migrate::{MigrateDatabase, MigrateError, Migrator};
use sqlx::postgres::{PgPool, Postgres};
use tracing::info;

use super::pool::{connect, PoolSettings};

pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("database unavailable: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] MigrateError),
}

/// Creates the database named by `url` unless it already exists
pub async fn create_database_if_missing(url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(url).await? {
        info!("Creating database");
        Postgres::create_database(url).await?;
    }
    Ok(())
}

pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await?;
    info!(migrations = MIGRATOR.iter().count(), "Schema up to date");
    Ok(())
}

/// Returns a connected pool over an up-to-date schema
pub async fn prepare(settings: &PoolSettings) -> Result<PgPool, SetupError> {
    create_database_if_missing(&settings.url).await?;
    let pool = connect(settings).await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// PostgreSQL connection pool
///
/// # Example
///
/// ```no_run
/// use teamboard_shared::db::pool::{connect, PoolSettings};
///
/// # async fn example() -> Result<(), sqlx::Error> {
/// let settings = PoolSettings::new("postgresql://teamboard@localhost/teamboard").max_connections(5);
/// let pool = connect(&settings).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

/// How the server talks to PostgreSQL
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,

    /// Wait for a free connection before giving up
    pub acquire_timeout: Duration,

    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl PoolSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
            max_lifetime: Some(Duration::from_secs(30 * 60)),
        }
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self.min_connections = self.min_connections.min(max_connections);
        self
    }
}

/// Opens the pool and makes one round trip before handing it out
pub async fn connect(settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    info!(
        max_connections = settings.max_connections,
        "Connecting to PostgreSQL"
    );

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .max_lifetime(settings.max_lifetime)
        .connect(&settings.url)
        .await?;

    ping(&pool).await?;
    Ok(pool)
}

/// `SELECT 1` against the pool
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    let (one,): (i32,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;
    if one != 1 {
        return Err(sqlx::Error::Protocol(format!("SELECT 1 returned {}", one)));
    }

    debug!("Database ping ok");
    Ok(())
}

pub async fn close(pool: PgPool) {
    info!("Closing database connections");
    pool.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = PoolSettings::new("postgresql://localhost/teamboard");
        assert_eq!(settings.max_connections, 10);
        assert_eq!(settings.min_connections, 1);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(30));
        assert_eq!(settings.idle_timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_max_connections_caps_minimum() {
        let settings = PoolSettings::new("postgresql://localhost/teamboard").max_connections(0);
        assert_eq!(settings.max_connections, 0);
        assert_eq!(settings.min_connections, 0);

        let settings = PoolSettings::new("postgresql://localhost/teamboard").max_connections(4);
        assert_eq!(settings.min_connections, 1);
    }
}

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::log::cb_log;

const LOG_KEY: &str = "POSTGRES";

/// Errors from ConnectionMonitor
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Owns the Postgres pool and reports its open/close/error transitions.
///
/// Starting the monitor never waits for the server: the pool connects lazily and a
/// background probe logs whether the first connection succeeded. Requests may run
/// before the database is reachable and fail individually until it is.
#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    pool: PgPool,
}

impl ConnectionMonitor {
    /// Build the pool for `database_url` and spawn the connection probe.
    /// Must be called inside a Tokio runtime.
    pub fn start(database_url: &str, config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = url::Url::parse(database_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(DatabaseError::InvalidDatabaseUrl);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_lazy(database_url)?;

        let probe = pool.clone();
        tokio::spawn(async move {
            match sqlx::query("SELECT 1").execute(&probe).await {
                Ok(_) => cb_log(LOG_KEY, "CONNECTED TO POSTGRES"),
                Err(e) => cb_log(LOG_KEY, e),
            }
        });

        info!("Connection monitor started for {}", redact(&url));
        Ok(Self { pool })
    }

    /// Start from the `DATABASE_URL` environment variable.
    pub fn from_env(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = std::env::var("DATABASE_URL").map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;
        Self::start(&url, config)
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close every pooled connection (e.g., on shutdown)
    pub async fn shutdown(self) {
        self.pool.close().await;
        cb_log(LOG_KEY, "DISCONNECTED FROM POSTGRES");
    }
}

fn redact(url: &url::Url) -> String {
    let mut shown = url.clone();
    if shown.password().is_some() {
        let _ = shown.set_password(Some("****"));
    }
    shown.to_string()
}

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::repositories::Repositories;

/// Default pool size for batch jobs and the dashboard.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Postgres connection pool with the wheel schema applied.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connects to `PostgreSQL` and runs pending migrations.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established or a
    /// migration fails.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connects with an explicit pool size and runs pending migrations.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established or a
    /// migration fails.
    pub async fn connect_with(database_url: &str, max_connections: u32) -> Result<Self> {
        let db = Self::connect_without_migrations(database_url, max_connections).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Connects without touching the schema (read-only consumers).
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn connect_without_migrations(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self> {
        if database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL is not set");
        }
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        Ok(Self { pool })
    }

    /// Applies the embedded migrations.
    ///
    /// # Errors
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run database migrations")?;
        info!("Database migrations applied");
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[must_use]
    pub fn repositories(&self) -> Repositories {
        Repositories::new(self.pool.clone())
    }
}

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Owner of the SQLite connection backing the interaction log.
///
/// Created once per process and handed to whoever needs storage; call
/// [`Database::close`] on shutdown.
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the SQLite file at `path`
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening SQLite database at {}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            // Other processes sharing the file hold the write lock briefly
            .busy_timeout(Duration::from_secs(5));

        Self::connect(connect_options)
            .await
            .with_context(|| format!("Failed to open SQLite database at {}", path.display()))
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn in_memory() -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Failed to parse in-memory SQLite URL")?;

        Self::connect(connect_options)
            .await
            .context("Failed to open in-memory SQLite database")
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        // Single connection: writes are serialized and an in-memory database
        // stays the same database for the pool's lifetime
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        info!("Database connection established successfully");
        Ok(Database { pool })
    }

    /// Create the interaction log table if it does not exist yet
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Ensuring logs table exists");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_query TEXT,
                response TEXT,
                feedback TEXT,
                timestamp TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create logs table")?;

        Ok(())
    }

    /// Perform a health check on the database connection
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database health check failed")?;

        info!("Database health check passed");
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }
}

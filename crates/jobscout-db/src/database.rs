use std::time::Duration;

use jobscout_core::AppError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::debug;

use crate::config::StoreConfig;
use crate::repository::JobRepository;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the SQLite pool, runs migrations and vends the repository.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    monthly_limit: i64,
}

impl Database {
    /// Open (creating if needed) the database file and apply migrations.
    pub async fn open(config: &StoreConfig) -> Result<Self, AppError> {
        std::fs::create_dir_all(&config.cache_dir).map_err(|e| {
            AppError::DatabaseError(format!(
                "Failed to create cache directory {}: {e}",
                config.cache_dir.display()
            ))
        })?;

        let path = config.db_path();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {e}")))?;

        debug!(path = %path.display(), "Opened job cache");

        let db = Self {
            pool,
            monthly_limit: config.monthly_limit,
        };
        db.migrate().await?;
        Ok(db)
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_pool(pool: SqlitePool, monthly_limit: i64) -> Self {
        Self {
            pool,
            monthly_limit,
        }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get a [`JobRepository`] backed by this pool.
    pub fn job_repo(&self) -> JobRepository {
        JobRepository::new(self.pool.clone(), self.monthly_limit)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

use std::path::PathBuf;

use jobscout_core::AppError;
use jobscout_core::config::parse_var;

const DB_FILE: &str = "jobs.db";

/// Configuration for the local job cache.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub cache_dir: PathBuf,
    pub monthly_limit: i64,
    pub max_connections: u32,
}

impl StoreConfig {
    /// Read configuration from environment variables.
    ///
    /// - `JOBSCOUT_CACHE_DIR` (optional, defaults to the platform cache directory)
    /// - `JOBSCOUT_MONTHLY_REQUEST_LIMIT` (optional, defaults to 5000)
    /// - `JOBSCOUT_DB_MAX_CONNECTIONS` (optional, defaults to 5)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cache_dir = lookup("JOBSCOUT_CACHE_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir);

        let monthly_limit: i64 = parse_var(&lookup, "JOBSCOUT_MONTHLY_REQUEST_LIMIT", 5000)?;
        if monthly_limit < 0 {
            return Err(AppError::ConfigError(format!(
                "Invalid JOBSCOUT_MONTHLY_REQUEST_LIMIT '{monthly_limit}': must not be negative"
            )));
        }

        let max_connections: u32 = parse_var(&lookup, "JOBSCOUT_DB_MAX_CONNECTIONS", 5)?;
        if max_connections == 0 {
            return Err(AppError::ConfigError(
                "JOBSCOUT_DB_MAX_CONNECTIONS must be at least 1".into(),
            ));
        }

        Ok(Self {
            cache_dir,
            monthly_limit,
            max_connections,
        })
    }

    /// Store rooted at `dir` with default limits.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: dir.into(),
            monthly_limit: 5000,
            max_connections: 5,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.cache_dir.join(DB_FILE)
    }
}

fn default_cache_dir() -> PathBuf {
    match directories::ProjectDirs::from("", "", "jobscout") {
        Some(dirs) => dirs.cache_dir().to_path_buf(),
        None => PathBuf::from(".jobscout"),
    }
}

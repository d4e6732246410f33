use std::str::FromStr;

use crate::error::AppError;

/// Parse an optional variable from `lookup`, falling back to `default` when unset.
///
/// Empty values count as unset. Anything else that does not parse is a
/// [`AppError::ConfigError`] naming the variable.
pub fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigError(format!("Invalid {key} '{raw}': expected a number"))
        }),
    }
}

/// Orchestrator policy: quota thresholds and cache freshness.
///
/// The monthly limit itself belongs to the store, which reports it with usage.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// A source is refetched once its last refresh is older than this.
    pub cache_expiry_hours: u32,
    /// Usage ratio at which the quota counts as low...
    pub quota_warning_ratio: f64,
    /// ...provided no more than this many requests remain.
    pub quota_warning_remaining: i64,
    /// Cap on cached records considered when falling back to the cache.
    pub cache_fetch_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_expiry_hours: 24,
            quota_warning_ratio: 0.8,
            quota_warning_remaining: 500,
            cache_fetch_limit: 200,
        }
    }
}

impl ServiceConfig {
    /// Read configuration from environment variables.
    ///
    /// - `JOBSCOUT_CACHE_EXPIRY_HOURS` (optional, defaults to 24)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            cache_expiry_hours: parse_var(&lookup, "JOBSCOUT_CACHE_EXPIRY_HOURS", defaults.cache_expiry_hours)?,
            ..defaults
        })
    }
}

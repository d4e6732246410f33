use std::time::Duration;

use jobscout_core::AppError;
use jobscout_core::config::parse_var;
use jobscout_core::retry::RetryConfig;

pub const DEFAULT_ENDPOINT: &str = "https://mcp.brightdata.com/mcp";

/// Connection settings for the remote scraping service.
#[derive(Clone)]
pub struct ClientConfig {
    /// Absent until a remote command actually needs it.
    pub api_token: Option<String>,
    pub endpoint: String,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_token", &self.masked_token())
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ClientConfig {
    /// Read configuration from environment variables.
    ///
    /// - `BRIGHT_DATA_API_TOKEN` (required for remote calls)
    /// - `BRIGHT_DATA_MCP_URL` (optional, defaults to [`DEFAULT_ENDPOINT`])
    /// - `JOBSCOUT_REQUEST_TIMEOUT_SECS` (optional, defaults to 120)
    /// - `JOBSCOUT_MAX_RETRIES` (optional, defaults to 3)
    /// - `JOBSCOUT_RETRY_BASE_DELAY_MS` (optional, defaults to 1000)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_token = lookup("BRIGHT_DATA_API_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let endpoint = lookup("BRIGHT_DATA_MCP_URL")
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        url::Url::parse(&endpoint).map_err(|e| {
            AppError::ConfigError(format!("Invalid BRIGHT_DATA_MCP_URL '{endpoint}': {e}"))
        })?;

        let timeout_secs: u64 = parse_var(&lookup, "JOBSCOUT_REQUEST_TIMEOUT_SECS", 120)?;
        if timeout_secs == 0 {
            return Err(AppError::ConfigError(
                "JOBSCOUT_REQUEST_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        let max_retries: u32 = parse_var(&lookup, "JOBSCOUT_MAX_RETRIES", 3)?;
        let base_delay_ms: u64 = parse_var(&lookup, "JOBSCOUT_RETRY_BASE_DELAY_MS", 1000)?;

        Ok(Self {
            api_token,
            endpoint,
            request_timeout: Duration::from_secs(timeout_secs),
            retry: RetryConfig::default()
                .with_max_retries(max_retries)
                .with_base_delay(Duration::from_millis(base_delay_ms)),
        })
    }

    /// The token, or the error a remote command reports before doing anything.
    pub fn require_token(&self) -> Result<&str, AppError> {
        self.api_token.as_deref().ok_or_else(|| {
            AppError::ConfigError(
                "Bright Data API token not configured. Set BRIGHT_DATA_API_TOKEN or add it to a .env file."
                    .into(),
            )
        })
    }

    /// Token safe for display: first and last four characters only.
    pub fn masked_token(&self) -> String {
        match self.api_token.as_deref() {
            None => "(not set)".to_string(),
            Some(token) if token.chars().count() <= 8 => "****".to_string(),
            Some(token) => {
                let chars: Vec<char> = token.chars().collect();
                let head: String = chars[..4].iter().collect();
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("{head}...{tail}")
            }
        }
    }
}

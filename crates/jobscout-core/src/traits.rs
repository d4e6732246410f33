use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{JobRecord, QuotaUsage};

/// A named operation exposed by the remote scraping service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Render a URL and return its content as clean markdown text.
    ScrapeAsMarkdown { url: String },
    /// Run a keyword web search.
    SearchEngine { query: String, num_results: u32 },
}

impl Capability {
    pub fn scrape(url: impl Into<String>) -> Self {
        Capability::ScrapeAsMarkdown { url: url.into() }
    }

    /// Tool name on the remote side.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Capability::ScrapeAsMarkdown { .. } => "scrape_as_markdown",
            Capability::SearchEngine { .. } => "search_engine",
        }
    }

    /// Tool arguments as a JSON object.
    pub fn arguments(&self) -> serde_json::Value {
        match self {
            Capability::ScrapeAsMarkdown { url } => serde_json::json!({ "url": url }),
            Capability::SearchEngine { query, num_results } => {
                serde_json::json!({ "query": query, "num_results": num_results })
            }
        }
    }
}

/// Invokes a remote capability and returns its textual payload.
pub trait ToolClient: Send + Sync + Clone {
    fn invoke(
        &self,
        capability: &Capability,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Durable storage of job records, the monthly quota counter and refresh markers.
///
/// Every method is an independent short transaction. Implementations must keep
/// `increment_quota` a single atomic statement.
pub trait JobStore: Send + Sync + Clone {
    /// Insert or replace records keyed by id. Returns the number written.
    fn upsert_jobs(
        &self,
        jobs: &[JobRecord],
    ) -> impl Future<Output = Result<usize, AppError>> + Send;

    fn get_job(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<JobRecord>, AppError>> + Send;

    /// Active records, newest `fetched_at` first.
    fn get_jobs(
        &self,
        source: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<JobRecord>, AppError>> + Send;

    /// Case-insensitive substring match over title, company, description and tags.
    fn search_jobs(
        &self,
        query: &str,
        source: Option<&str>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<JobRecord>, AppError>> + Send;

    /// Delete records fetched more than `days` ago. Returns the number deleted.
    fn expire_older_than(&self, days: u32) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Number of active records, optionally for one source.
    fn job_count(&self, source: Option<&str>) -> impl Future<Output = Result<i64, AppError>> + Send;

    /// Add `amount` to the current month's counter and return the new total.
    fn increment_quota(&self, amount: i64) -> impl Future<Output = Result<i64, AppError>> + Send;

    fn get_quota(&self) -> impl Future<Output = Result<QuotaUsage, AppError>> + Send;

    fn set_last_refresh(&self, source: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    fn get_last_refresh(
        &self,
        source: &str,
    ) -> impl Future<Output = Result<Option<DateTime<Utc>>, AppError>> + Send;

    /// True when no refresh marker exists or it is older than `threshold_hours`.
    fn is_stale(
        &self,
        source: &str,
        threshold_hours: u32,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;
}

/// Staleness rule shared by every store.
pub fn is_stale_since(
    last_refresh: Option<DateTime<Utc>>,
    threshold_hours: u32,
    now: DateTime<Utc>,
) -> bool {
    match last_refresh {
        None => true,
        Some(at) => now - at > chrono::TimeDelta::hours(i64::from(threshold_hours)),
    }
}

pub mod config;
pub mod error;
pub mod extract;
pub mod filter;
pub mod models;
pub mod retry;
pub mod service;
pub mod sources;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::ServiceConfig;
pub use error::AppError;
pub use filter::{FilterCriteria, SortKey};
pub use models::{JobRecord, QuotaUsage, ScraperOutcome, compute_hash, job_id};
pub use retry::{RetryConfig, RetryingToolClient};
pub use service::{QuotaStatus, SearchReport, SearchRequest, SearchService, TracingSearchReporter};
pub use sources::Source;
pub use traits::{Capability, JobStore, ToolClient};

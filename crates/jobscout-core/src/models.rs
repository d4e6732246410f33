use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the URL hash for a job id.
pub const JOB_ID_LEN: usize = 12;

/// Location assumed when a listing does not name one.
pub const DEFAULT_LOCATION: &str = "Beijing";

/// One job listing scraped from a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Derived from `url` via [`job_id`].
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    /// Normalized `"<low>k-<high>k"` monthly range.
    pub salary_range: Option<String>,
    /// `"a-b years"`, `"a+ years"` or `"Entry Level"`.
    pub experience: Option<String>,
    pub education: Option<String>,
    pub description: Option<String>,
    pub requirements: Vec<String>,
    pub tags: Vec<String>,
    pub posted_date: Option<DateTime<Utc>>,
    pub url: String,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub is_active: bool,
}

impl JobRecord {
    /// Create a record with only the identifying fields set.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            id: job_id(&url),
            title: title.into(),
            company: "Unknown".to_string(),
            location: DEFAULT_LOCATION.to_string(),
            salary_range: None,
            experience: None,
            education: None,
            description: None,
            requirements: Vec::new(),
            tags: Vec::new(),
            posted_date: None,
            url,
            source: source.into(),
            fetched_at: Utc::now(),
            is_active: true,
        }
    }
}

/// Result of one search attempt against a single platform.
///
/// Never persisted. A failed platform yields an empty job list with `error` set.
#[derive(Debug, Clone, Serialize)]
pub struct ScraperOutcome {
    pub jobs: Vec<JobRecord>,
    pub total_count: usize,
    pub page: u32,
    /// Best-effort hint derived from the page size, not a real pagination signal.
    pub has_more: bool,
    pub source: String,
    pub error: Option<String>,
}

impl ScraperOutcome {
    pub fn success(source: &str, page: u32, jobs: Vec<JobRecord>, has_more: bool) -> Self {
        Self {
            total_count: jobs.len(),
            jobs,
            page,
            has_more,
            source: source.to_string(),
            error: None,
        }
    }

    pub fn failure(source: &str, page: u32, error: impl Into<String>) -> Self {
        Self {
            jobs: Vec::new(),
            total_count: 0,
            page,
            has_more: false,
            source: source.to_string(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Remote-call usage for the current calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    /// `YYYY-MM`
    pub month: String,
    pub requests_used: i64,
    pub monthly_limit: i64,
}

impl QuotaUsage {
    pub fn requests_remaining(&self) -> i64 {
        (self.monthly_limit - self.requests_used).max(0)
    }

    pub fn usage_percentage(&self) -> f64 {
        if self.monthly_limit > 0 {
            self.requests_used as f64 * 100.0 / self.monthly_limit as f64
        } else {
            0.0
        }
    }
}

/// Calendar month key (`YYYY-MM`) used by the quota counter.
pub fn month_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stable job identifier: the leading [`JOB_ID_LEN`] hex chars of the URL hash.
pub fn job_id(url: &str) -> String {
    let mut hash = compute_hash(url);
    hash.truncate(JOB_ID_LEN);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        let h2 = compute_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_job_id_is_stable_and_short() {
        let url = "https://www.zhaopin.com/jobdetail/CC123.htm";
        assert_eq!(job_id(url), job_id(url));
        assert_eq!(job_id(url).len(), JOB_ID_LEN);
        assert_ne!(job_id(url), job_id("https://www.zhaopin.com/jobdetail/CC124.htm"));
    }

    #[test]
    fn test_new_record_derives_id_from_url() {
        let a = JobRecord::new("Rust Engineer", "https://example.com/1", "zhaopin");
        let b = JobRecord::new("Different Title", "https://example.com/1", "linkedin");
        assert_eq!(a.id, b.id);
        assert_eq!(a.location, DEFAULT_LOCATION);
        assert!(a.is_active);
    }

    #[test]
    fn test_quota_remaining_saturates() {
        let usage = QuotaUsage {
            month: "2026-10".into(),
            requests_used: 5200,
            monthly_limit: 5000,
        };
        assert_eq!(usage.requests_remaining(), 0);
        assert!(usage.usage_percentage() > 100.0);
    }

    #[test]
    fn test_month_key_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(month_key(at), "2026-03");
    }
}

//! Test utilities: mock implementations of the core traits.
//!
//! All mocks use `Arc<Mutex<_>>` so clones share state and tests can assert
//! on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::AppError;
use crate::models::{JobRecord, QuotaUsage, month_key};
use crate::traits::{Capability, JobStore, ToolClient, is_stale_since};

// ---------------------------------------------------------------------------
// MockToolClient
// ---------------------------------------------------------------------------

/// Mock remote client. Each call pops the first queued response; an empty
/// queue yields an empty page.
#[derive(Clone, Default)]
pub struct MockToolClient {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    pub calls: Arc<Mutex<Vec<Capability>>>,
}

impl MockToolClient {
    pub fn new(text: &str) -> Self {
        Self::with_responses(vec![Ok(text.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// URLs of every scrape call, in order.
    pub fn scraped_urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Capability::ScrapeAsMarkdown { url } => Some(url.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ToolClient for MockToolClient {
    async fn invoke(&self, capability: &Capability) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(capability.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(String::new())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    jobs: HashMap<String, JobRecord>,
    quota: HashMap<String, i64>,
    refreshed: HashMap<String, DateTime<Utc>>,
}

/// In-memory [`JobStore`] with the same observable semantics as the SQLite one.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    monthly_limit: i64,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryStore {
    pub fn new(monthly_limit: i64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            monthly_limit,
            fail_writes: Arc::new(Mutex::new(false)),
        }
    }

    /// Store pre-populated with records.
    pub fn with_jobs(monthly_limit: i64, jobs: Vec<JobRecord>) -> Self {
        let store = Self::new(monthly_limit);
        {
            let mut state = store.state.lock().unwrap();
            for job in jobs {
                state.jobs.insert(job.id.clone(), job);
            }
        }
        store
    }

    /// Make every subsequent upsert fail.
    pub fn fail_writes(&self) {
        *self.fail_writes.lock().unwrap() = true;
    }

    pub fn set_quota_used(&self, used: i64) {
        let month = month_key(Utc::now());
        self.state.lock().unwrap().quota.insert(month, used);
    }

    pub fn set_refreshed_at(&self, source: &str, at: DateTime<Utc>) {
        self.state
            .lock()
            .unwrap()
            .refreshed
            .insert(source.to_string(), at);
    }

    pub fn quota_used(&self) -> i64 {
        let month = month_key(Utc::now());
        self.state
            .lock()
            .unwrap()
            .quota
            .get(&month)
            .copied()
            .unwrap_or(0)
    }

    pub fn all_jobs(&self) -> Vec<JobRecord> {
        self.state.lock().unwrap().jobs.values().cloned().collect()
    }
}

fn newest_first(mut jobs: Vec<JobRecord>) -> Vec<JobRecord> {
    jobs.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
    jobs
}

impl JobStore for MemoryStore {
    async fn upsert_jobs(&self, jobs: &[JobRecord]) -> Result<usize, AppError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(AppError::DatabaseError("disk I/O error".into()));
        }
        let mut state = self.state.lock().unwrap();
        for job in jobs {
            state.jobs.insert(job.id.clone(), job.clone());
        }
        Ok(jobs.len())
    }

    async fn get_job(&self, id: &str) -> Result<Option<JobRecord>, AppError> {
        Ok(self.state.lock().unwrap().jobs.get(id).cloned())
    }

    async fn get_jobs(
        &self,
        source: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JobRecord>, AppError> {
        let jobs: Vec<JobRecord> = self
            .state
            .lock()
            .unwrap()
            .jobs
            .values()
            .filter(|j| j.is_active && source.is_none_or(|s| j.source == s))
            .cloned()
            .collect();
        Ok(newest_first(jobs)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn search_jobs(
        &self,
        query: &str,
        source: Option<&str>,
        limit: usize,
    ) -> Result<Vec<JobRecord>, AppError> {
        let needle = query.to_lowercase();
        let jobs: Vec<JobRecord> = self
            .state
            .lock()
            .unwrap()
            .jobs
            .values()
            .filter(|j| j.is_active && source.is_none_or(|s| j.source == s))
            .filter(|j| {
                j.title.to_lowercase().contains(&needle)
                    || j.company.to_lowercase().contains(&needle)
                    || j
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
                    || j.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        Ok(newest_first(jobs).into_iter().take(limit).collect())
    }

    async fn expire_older_than(&self, days: u32) -> Result<u64, AppError> {
        let cutoff = Utc::now() - TimeDelta::days(i64::from(days));
        let mut state = self.state.lock().unwrap();
        let before = state.jobs.len();
        state.jobs.retain(|_, j| j.fetched_at >= cutoff);
        Ok((before - state.jobs.len()) as u64)
    }

    async fn job_count(&self, source: Option<&str>) -> Result<i64, AppError> {
        let state = self.state.lock().unwrap();
        let count = state
            .jobs
            .values()
            .filter(|j| j.is_active && source.is_none_or(|s| j.source == s))
            .count();
        Ok(count as i64)
    }

    async fn increment_quota(&self, amount: i64) -> Result<i64, AppError> {
        let month = month_key(Utc::now());
        let mut state = self.state.lock().unwrap();
        let used = state.quota.entry(month).or_insert(0);
        *used += amount;
        Ok(*used)
    }

    async fn get_quota(&self) -> Result<QuotaUsage, AppError> {
        Ok(QuotaUsage {
            month: month_key(Utc::now()),
            requests_used: self.quota_used(),
            monthly_limit: self.monthly_limit,
        })
    }

    async fn set_last_refresh(&self, source: &str) -> Result<(), AppError> {
        self.set_refreshed_at(source, Utc::now());
        Ok(())
    }

    async fn get_last_refresh(&self, source: &str) -> Result<Option<DateTime<Utc>>, AppError> {
        Ok(self.state.lock().unwrap().refreshed.get(source).copied())
    }

    async fn is_stale(&self, source: &str, threshold_hours: u32) -> Result<bool, AppError> {
        let last = self.get_last_refresh(source).await?;
        Ok(is_stale_since(last, threshold_hours, Utc::now()))
    }
}

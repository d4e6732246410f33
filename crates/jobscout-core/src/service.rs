//! Search orchestration: cache first, quota-aware remote fetch, persist, filter.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ServiceConfig;
use crate::error::AppError;
use crate::filter::{FilterCriteria, SortKey, filter_jobs, sort_jobs};
use crate::models::{DEFAULT_LOCATION, JobRecord, QuotaUsage};
use crate::sources::{Scraper, Source};
use crate::traits::{JobStore, ToolClient};

/// Remaining-quota verdict that decides whether remote calls are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuotaStatus {
    Ok,
    /// Past the warning ratio with few requests left.
    Low { remaining: i64 },
    /// Nothing left this month; only cached data may be served.
    Exhausted { used: i64, limit: i64 },
}

impl QuotaStatus {
    pub fn evaluate(usage: &QuotaUsage, config: &ServiceConfig) -> Self {
        let threshold = usage.monthly_limit as f64 * config.quota_warning_ratio;
        if (usage.requests_used as f64) < threshold {
            return QuotaStatus::Ok;
        }
        let remaining = usage.requests_remaining();
        if remaining <= 0 {
            QuotaStatus::Exhausted {
                used: usage.requests_used,
                limit: usage.monthly_limit,
            }
        } else if remaining <= config.quota_warning_remaining {
            QuotaStatus::Low { remaining }
        } else {
            QuotaStatus::Ok
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, QuotaStatus::Exhausted { .. })
    }
}

/// Events emitted while searching, for progress display or logging.
#[derive(Debug, Clone)]
pub enum SearchEvent<'a> {
    CacheHit { query: &'a str, count: usize },
    QuotaLow { remaining: i64 },
    QuotaExhausted { used: i64, limit: i64 },
    SourceStarted { source: Source },
    SourceFinished { source: Source, count: usize },
    SourceFailed { source: Source, error: &'a str },
    Saved { count: usize },
}

/// Receives search events (decoupled logging).
pub trait SearchReporter: Send + Sync {
    fn report(&self, event: SearchEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSearchReporter;

impl SearchReporter for TracingSearchReporter {
    fn report(&self, event: SearchEvent<'_>) {
        match event {
            SearchEvent::CacheHit { query, count } => {
                tracing::info!(%query, count, "Serving search from cache");
            }
            SearchEvent::QuotaLow { remaining } => {
                tracing::warn!(remaining, "Monthly request quota running low");
            }
            SearchEvent::QuotaExhausted { used, limit } => {
                tracing::warn!(used, limit, "Monthly request quota exhausted");
            }
            SearchEvent::SourceStarted { source } => {
                tracing::info!(%source, "Searching source");
            }
            SearchEvent::SourceFinished { source, count } => {
                tracing::info!(%source, count, "Source search finished");
            }
            SearchEvent::SourceFailed { source, error } => {
                tracing::warn!(%source, %error, "Source search failed");
            }
            SearchEvent::Saved { count } => {
                tracing::debug!(count, "Saved jobs to cache");
            }
        }
    }
}

/// Parameters of one user search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub location: String,
    pub sources: Vec<Source>,
    pub page: u32,
    pub limit: usize,
    /// Skip the cache lookup and always fetch.
    pub no_cache: bool,
    pub criteria: FilterCriteria,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            location: DEFAULT_LOCATION.to_string(),
            sources: vec![Source::Zhaopin],
            page: 1,
            limit: 20,
            no_cache: false,
            criteria: FilterCriteria::default(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_criteria(mut self, criteria: FilterCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn bypass_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    /// Source name to scope store lookups to, when exactly one is requested.
    fn source_filter(&self) -> Option<&'static str> {
        match self.sources.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub jobs: Vec<JobRecord>,
    /// Matches after filtering, before truncation to the limit.
    pub total_matches: usize,
    pub from_cache: bool,
    /// Served from cache because the monthly quota is spent.
    pub rate_limited: bool,
    pub warnings: Vec<String>,
    pub quota: QuotaStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRefresh {
    pub source: Source,
    pub fetched: usize,
    /// Records that were not cached before.
    pub new: i64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub sources: Vec<SourceRefresh>,
    pub rate_limited: bool,
    pub total_cached: i64,
    pub quota: QuotaUsage,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub source: Source,
    pub count: i64,
    pub last_refresh: Option<DateTime<Utc>>,
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub quota: QuotaUsage,
    pub status: QuotaStatus,
    pub total_jobs: i64,
    pub sources: Vec<SourceStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailReport {
    pub job: JobRecord,
    /// True when the detail page was fetched and merged.
    pub fetched: bool,
    pub warning: Option<String>,
}

/// Coordinates the remote client, the store and the filter engine.
///
/// Platforms are queried one after another, so quota increments and store
/// writes inside one command never race each other.
pub struct SearchService<C, S>
where
    C: ToolClient,
    S: JobStore,
{
    client: C,
    store: S,
    config: ServiceConfig,
}

impl<C, S> SearchService<C, S>
where
    C: ToolClient,
    S: JobStore,
{
    pub fn new(client: C, store: S, config: ServiceConfig) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub async fn quota_status(&self) -> Result<QuotaStatus, AppError> {
        let usage = self.store.get_quota().await?;
        Ok(QuotaStatus::evaluate(&usage, &self.config))
    }

    /// Run a search.
    ///
    /// 1. Serve from cache when it has matches (unless `no_cache`)
    /// 2. With the quota spent, serve every cached job instead
    /// 3. Otherwise query each requested source, billing one request per source
    /// 4. Persist what was fetched and mark the sources refreshed
    /// 5. Filter and truncate
    pub async fn search<R: SearchReporter>(
        &self,
        request: &SearchRequest,
        reporter: &R,
    ) -> Result<SearchReport, AppError> {
        let mut warnings = Vec::new();

        if !request.no_cache {
            let cached = self
                .store
                .search_jobs(
                    &request.query,
                    request.source_filter(),
                    self.config.cache_fetch_limit,
                )
                .await?;
            if !cached.is_empty() {
                reporter.report(SearchEvent::CacheHit {
                    query: &request.query,
                    count: cached.len(),
                });
                for source in &request.sources {
                    if self
                        .store
                        .is_stale(source.as_str(), self.config.cache_expiry_hours)
                        .await?
                    {
                        warnings.push(format!(
                            "Cached {source} results are older than {}h. Use --no-cache to refresh.",
                            self.config.cache_expiry_hours
                        ));
                    }
                }
                let quota = self.quota_status().await?;
                return Ok(finish(cached, request, true, false, warnings, quota));
            }
        }

        let quota = self.quota_status().await?;
        match quota {
            QuotaStatus::Exhausted { used, limit } => {
                reporter.report(SearchEvent::QuotaExhausted { used, limit });
                warnings.push(format!(
                    "Monthly request limit reached ({used}/{limit}). Using cached data only. Limit resets next month."
                ));
                let cached = self
                    .store
                    .get_jobs(None, self.config.cache_fetch_limit, 0)
                    .await?;
                return Ok(finish(cached, request, true, true, warnings, quota));
            }
            QuotaStatus::Low { remaining } => {
                reporter.report(SearchEvent::QuotaLow { remaining });
                warnings.push(format!(
                    "Request quota low: {remaining} requests remaining this month."
                ));
            }
            QuotaStatus::Ok => {}
        }

        let mut fetched = Vec::new();
        let mut refreshed = Vec::new();
        for &source in &request.sources {
            reporter.report(SearchEvent::SourceStarted { source });
            let outcome = Scraper::new(source, &self.client)
                .search(&request.query, &request.location, request.page)
                .await;
            // One logical request, however many attempts it took.
            self.store.increment_quota(1).await?;

            match outcome.error {
                Some(error) => {
                    reporter.report(SearchEvent::SourceFailed {
                        source,
                        error: &error,
                    });
                    warnings.push(format!("{source}: {error}"));
                }
                None => {
                    reporter.report(SearchEvent::SourceFinished {
                        source,
                        count: outcome.jobs.len(),
                    });
                    if !outcome.jobs.is_empty() {
                        refreshed.push(source);
                    }
                    fetched.extend(outcome.jobs);
                }
            }
        }

        if !fetched.is_empty() {
            let saved = self.store.upsert_jobs(&fetched).await?;
            reporter.report(SearchEvent::Saved { count: saved });
            for source in refreshed {
                self.store.set_last_refresh(source.as_str()).await?;
            }
        }

        let quota = self.quota_status().await?;
        Ok(finish(fetched, request, false, false, warnings, quota))
    }

    /// Fetch fresh listings for each source and cache them.
    pub async fn refresh<R: SearchReporter>(
        &self,
        sources: &[Source],
        query: &str,
        location: &str,
        reporter: &R,
    ) -> Result<RefreshReport, AppError> {
        let mut report = RefreshReport {
            sources: Vec::with_capacity(sources.len()),
            rate_limited: false,
            total_cached: 0,
            quota: self.store.get_quota().await?,
        };

        if let QuotaStatus::Exhausted { used, limit } = QuotaStatus::evaluate(&report.quota, &self.config)
        {
            reporter.report(SearchEvent::QuotaExhausted { used, limit });
            report.rate_limited = true;
            report.total_cached = self.store.job_count(None).await?;
            return Ok(report);
        }

        for &source in sources {
            reporter.report(SearchEvent::SourceStarted { source });
            let before = self.store.job_count(Some(source.as_str())).await?;
            let outcome = Scraper::new(source, &self.client)
                .search(query, location, 1)
                .await;
            self.store.increment_quota(1).await?;

            let mut entry = SourceRefresh {
                source,
                fetched: outcome.jobs.len(),
                new: 0,
                error: outcome.error.clone(),
            };
            if let Some(error) = &outcome.error {
                reporter.report(SearchEvent::SourceFailed {
                    source,
                    error: error.as_str(),
                });
            } else {
                reporter.report(SearchEvent::SourceFinished {
                    source,
                    count: outcome.jobs.len(),
                });
                if !outcome.jobs.is_empty() {
                    let saved = self.store.upsert_jobs(&outcome.jobs).await?;
                    reporter.report(SearchEvent::Saved { count: saved });
                    self.store.set_last_refresh(source.as_str()).await?;
                    let after = self.store.job_count(Some(source.as_str())).await?;
                    entry.new = (after - before).max(0);
                }
            }
            report.sources.push(entry);
        }

        report.total_cached = self.store.job_count(None).await?;
        report.quota = self.store.get_quota().await?;
        Ok(report)
    }

    /// Cached listings, filtered and sorted.
    pub async fn list(
        &self,
        source: Option<Source>,
        criteria: &FilterCriteria,
        sort: SortKey,
        limit: usize,
    ) -> Result<Vec<JobRecord>, AppError> {
        let fetch = if criteria.is_empty() && sort == SortKey::Date {
            limit
        } else {
            self.config.cache_fetch_limit.max(limit)
        };
        let jobs = self
            .store
            .get_jobs(source.as_ref().map(Source::as_str), fetch, 0)
            .await?;
        let mut jobs = filter_jobs(jobs, criteria);
        sort_jobs(&mut jobs, sort);
        jobs.truncate(limit);
        Ok(jobs)
    }

    pub async fn stats(&self) -> Result<CacheStats, AppError> {
        let quota = self.store.get_quota().await?;
        let status = QuotaStatus::evaluate(&quota, &self.config);
        let mut sources = Vec::with_capacity(Source::ALL.len());
        for source in Source::ALL {
            let name = source.as_str();
            sources.push(SourceStats {
                source,
                count: self.store.job_count(Some(name)).await?,
                last_refresh: self.store.get_last_refresh(name).await?,
                stale: self
                    .store
                    .is_stale(name, self.config.cache_expiry_hours)
                    .await?,
            });
        }
        Ok(CacheStats {
            quota,
            status,
            total_jobs: self.store.job_count(None).await?,
            sources,
        })
    }

    /// Look up a cached job, optionally fetching and merging its detail page.
    ///
    /// A failed or disallowed fetch still returns the cached record, with a warning.
    pub async fn detail(&self, id: &str, fetch: bool) -> Result<Option<DetailReport>, AppError> {
        let Some(job) = self.store.get_job(id).await? else {
            return Ok(None);
        };
        let cached = |warning: Option<String>| DetailReport {
            job: job.clone(),
            fetched: false,
            warning,
        };
        if !fetch {
            return Ok(Some(cached(None)));
        }

        if let QuotaStatus::Exhausted { used, limit } = self.quota_status().await? {
            return Ok(Some(cached(Some(format!(
                "Monthly request limit reached ({used}/{limit}). Showing cached details."
            )))));
        }
        let source: Source = match job.source.parse() {
            Ok(source) => source,
            Err(e) => return Ok(Some(cached(Some(e.to_string())))),
        };

        let result = Scraper::new(source, &self.client)
            .fetch_detail(job.clone())
            .await;
        self.store.increment_quota(1).await?;

        match result {
            Ok(updated) => {
                self.store.upsert_jobs(std::slice::from_ref(&updated)).await?;
                Ok(Some(DetailReport {
                    job: updated,
                    fetched: true,
                    warning: None,
                }))
            }
            Err(e) => Ok(Some(cached(Some(format!("{source}: {e}"))))),
        }
    }

    /// Delete cached jobs fetched more than `days` ago.
    pub async fn expire(&self, days: u32) -> Result<u64, AppError> {
        let deleted = self.store.expire_older_than(days).await?;
        tracing::info!(days, deleted, "Expired cached jobs");
        Ok(deleted)
    }
}

fn finish(
    jobs: Vec<JobRecord>,
    request: &SearchRequest,
    from_cache: bool,
    rate_limited: bool,
    warnings: Vec<String>,
    quota: QuotaStatus,
) -> SearchReport {
    let mut jobs = filter_jobs(jobs, &request.criteria);
    let total_matches = jobs.len();
    jobs.truncate(request.limit);
    SearchReport {
        jobs,
        total_matches,
        from_cache,
        rate_limited,
        warnings,
        quota,
    }
}

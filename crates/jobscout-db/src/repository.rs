use chrono::{DateTime, TimeDelta, Utc};
use jobscout_core::error::AppError;
use jobscout_core::models::{JobRecord, QuotaUsage, month_key};
use jobscout_core::traits::{JobStore, is_stale_since};
use sqlx::SqlitePool;
use tracing::debug;

const JOB_COLUMNS: &str = "id, title, company, location, salary_range, experience, education, \
     description, requirements, tags, posted_date, url, source, fetched_at, is_active";

/// Repository for job records, the monthly quota counter and cache metadata.
#[derive(Clone)]
pub struct JobRepository {
    pool: SqlitePool,
    monthly_limit: i64,
}

impl JobRepository {
    pub fn new(pool: SqlitePool, monthly_limit: i64) -> Self {
        Self {
            pool,
            monthly_limit,
        }
    }

    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO cache_metadata (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>, AppError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM cache_metadata WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(row.map(|r| r.0))
    }

    /// Staleness evaluated against an explicit clock.
    pub async fn is_stale_at(
        &self,
        source: &str,
        threshold_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let last = self.get_last_refresh(source).await?;
        Ok(is_stale_since(last, threshold_hours, now))
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

fn refresh_key(source: &str) -> String {
    format!("last_refresh_{source}")
}

/// `%needle%` with LIKE wildcards in the needle escaped by `\`.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    title: String,
    company: String,
    location: String,
    salary_range: Option<String>,
    experience: Option<String>,
    education: Option<String>,
    description: Option<String>,
    requirements: String,
    tags: String,
    posted_date: Option<DateTime<Utc>>,
    url: String,
    source: String,
    fetched_at: DateTime<Utc>,
    is_active: bool,
}

impl From<JobRow> for JobRecord {
    fn from(row: JobRow) -> Self {
        JobRecord {
            id: row.id,
            title: row.title,
            company: row.company,
            location: row.location,
            salary_range: row.salary_range,
            experience: row.experience,
            education: row.education,
            description: row.description,
            requirements: serde_json::from_str(&row.requirements).unwrap_or_default(),
            tags: serde_json::from_str(&row.tags).unwrap_or_default(),
            posted_date: row.posted_date,
            url: row.url,
            source: row.source,
            fetched_at: row.fetched_at,
            is_active: row.is_active,
        }
    }
}

// -- Trait implementation --

impl JobStore for JobRepository {
    async fn upsert_jobs(&self, jobs: &[JobRecord]) -> Result<usize, AppError> {
        if jobs.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        for job in jobs {
            let requirements = serde_json::to_string(&job.requirements)?;
            let tags = serde_json::to_string(&job.tags)?;
            sqlx::query(
                r#"
                INSERT INTO jobs (id, title, company, location, salary_range, experience, education,
                                  description, requirements, tags, posted_date, url, source,
                                  fetched_at, is_active)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    company = excluded.company,
                    location = excluded.location,
                    salary_range = excluded.salary_range,
                    experience = excluded.experience,
                    education = excluded.education,
                    description = excluded.description,
                    requirements = excluded.requirements,
                    tags = excluded.tags,
                    posted_date = excluded.posted_date,
                    url = excluded.url,
                    source = excluded.source,
                    fetched_at = excluded.fetched_at,
                    is_active = excluded.is_active
                "#,
            )
            .bind(&job.id)
            .bind(&job.title)
            .bind(&job.company)
            .bind(&job.location)
            .bind(&job.salary_range)
            .bind(&job.experience)
            .bind(&job.education)
            .bind(&job.description)
            .bind(requirements)
            .bind(tags)
            .bind(job.posted_date)
            .bind(&job.url)
            .bind(&job.source)
            .bind(job.fetched_at)
            .bind(job.is_active)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        debug!(count = jobs.len(), "Upserted jobs");
        Ok(jobs.len())
    }

    async fn get_job(&self, id: &str) -> Result<Option<JobRecord>, AppError> {
        let row = sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(row.map(Into::into))
    }

    async fn get_jobs(
        &self,
        source: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JobRecord>, AppError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE is_active = 1 AND (?1 IS NULL OR source = ?1)
            ORDER BY fetched_at DESC
            LIMIT ?2 OFFSET ?3
            "#
        ))
        .bind(source)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn search_jobs(
        &self,
        query: &str,
        source: Option<&str>,
        limit: usize,
    ) -> Result<Vec<JobRecord>, AppError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE is_active = 1
              AND (?2 IS NULL OR source = ?2)
              AND (lower(title) LIKE ?1 ESCAPE '\'
                   OR lower(company) LIKE ?1 ESCAPE '\'
                   OR lower(coalesce(description, '')) LIKE ?1 ESCAPE '\'
                   OR lower(tags) LIKE ?1 ESCAPE '\')
            ORDER BY fetched_at DESC
            LIMIT ?3
            "#
        ))
        .bind(like_pattern(query))
        .bind(source)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn expire_older_than(&self, days: u32) -> Result<u64, AppError> {
        let cutoff = Utc::now() - TimeDelta::days(i64::from(days));
        let result = sqlx::query("DELETE FROM jobs WHERE fetched_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn job_count(&self, source: Option<&str>) -> Result<i64, AppError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM jobs WHERE is_active = 1 AND (?1 IS NULL OR source = ?1)",
        )
        .bind(source)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(row.0)
    }

    async fn increment_quota(&self, amount: i64) -> Result<i64, AppError> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO request_quota (month, requests_used)
            VALUES (?1, ?2)
            ON CONFLICT(month) DO UPDATE SET requests_used = requests_used + excluded.requests_used
            RETURNING requests_used
            "#,
        )
        .bind(month_key(Utc::now()))
        .bind(amount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(row.0)
    }

    async fn get_quota(&self) -> Result<QuotaUsage, AppError> {
        let month = month_key(Utc::now());
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT requests_used FROM request_quota WHERE month = ?1")
                .bind(&month)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(QuotaUsage {
            month,
            requests_used: row.map_or(0, |r| r.0),
            monthly_limit: self.monthly_limit,
        })
    }

    async fn set_last_refresh(&self, source: &str) -> Result<(), AppError> {
        self.set_metadata(&refresh_key(source), &Utc::now().to_rfc3339())
            .await
    }

    async fn get_last_refresh(&self, source: &str) -> Result<Option<DateTime<Utc>>, AppError> {
        let Some(raw) = self.get_metadata(&refresh_key(source)).await? else {
            return Ok(None);
        };
        // An unreadable marker counts as never refreshed.
        Ok(DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|at| at.with_timezone(&Utc)))
    }

    async fn is_stale(&self, source: &str, threshold_hours: u32) -> Result<bool, AppError> {
        self.is_stale_at(source, threshold_hours, Utc::now()).await
    }
}

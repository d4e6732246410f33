use chrono::{DateTime, Utc};
use jobscout_core::models::JobRecord;
use jobscout_db::{Database, JobRepository, StoreConfig};
use tempfile::TempDir;

/// Opens a fresh migrated database in a temporary directory.
///
/// The `TempDir` must be kept in scope for the test duration; dropping it
/// deletes the database file.
pub async fn setup_test_db(monthly_limit: i64) -> (JobRepository, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = StoreConfig::in_dir(dir.path());
    config.monthly_limit = monthly_limit;

    let db = Database::open(&config)
        .await
        .expect("Failed to open test database");

    (db.job_repo(), dir)
}

pub fn job(n: u32, source: &str, fetched_at: DateTime<Utc>) -> JobRecord {
    let mut job = JobRecord::new(
        format!("Rust Engineer {n}"),
        format!("https://jobs.example.com/{source}/{n}"),
        source,
    );
    job.company = format!("Company {n}");
    job.fetched_at = fetched_at;
    job
}

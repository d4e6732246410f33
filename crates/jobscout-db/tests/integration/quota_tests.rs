use chrono::{TimeDelta, Utc};
use jobscout_core::models::month_key;
use jobscout_core::traits::JobStore;

use crate::integration::common::setup_test_db;

#[tokio::test]
async fn quota_starts_at_zero_for_current_month() {
    let (repo, _dir) = setup_test_db(1200).await;

    let usage = repo.get_quota().await.unwrap();

    assert_eq!(usage.month, month_key(Utc::now()));
    assert_eq!(usage.requests_used, 0);
    assert_eq!(usage.monthly_limit, 1200);
    assert_eq!(usage.requests_remaining(), 1200);
}

#[tokio::test]
async fn increment_returns_running_total() {
    let (repo, _dir) = setup_test_db(5000).await;

    assert_eq!(repo.increment_quota(1).await.unwrap(), 1);
    assert_eq!(repo.increment_quota(4).await.unwrap(), 5);

    let usage = repo.get_quota().await.unwrap();
    assert_eq!(usage.requests_used, 5);
    assert_eq!(usage.requests_remaining(), 4995);
}

#[tokio::test]
async fn concurrent_increments_are_not_lost() {
    let (repo, _dir) = setup_test_db(5000).await;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.increment_quota(1).await })
        })
        .collect();

    let mut totals = Vec::new();
    for handle in handles {
        totals.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(repo.get_quota().await.unwrap().requests_used, 20);
    totals.sort_unstable();
    assert_eq!(totals, (1..=20).collect::<Vec<i64>>());
}

#[tokio::test]
async fn refresh_markers_drive_staleness() {
    let (repo, _dir) = setup_test_db(5000).await;

    assert!(repo.get_last_refresh("zhaopin").await.unwrap().is_none());
    assert!(repo.is_stale("zhaopin", 24).await.unwrap());

    repo.set_last_refresh("zhaopin").await.unwrap();

    let marked = repo.get_last_refresh("zhaopin").await.unwrap().unwrap();
    assert!(Utc::now() - marked < TimeDelta::minutes(1));
    assert!(!repo.is_stale("zhaopin", 24).await.unwrap());
    assert!(repo.is_stale("linkedin", 24).await.unwrap());

    let later = Utc::now() + TimeDelta::hours(25);
    assert!(repo.is_stale_at("zhaopin", 24, later).await.unwrap());
    assert!(!repo.is_stale_at("zhaopin", 48, later).await.unwrap());
}

#[tokio::test]
async fn metadata_overwrites_in_place() {
    let (repo, _dir) = setup_test_db(5000).await;

    assert!(repo.get_metadata("schema").await.unwrap().is_none());
    repo.set_metadata("schema", "v1").await.unwrap();
    repo.set_metadata("schema", "v2").await.unwrap();

    assert_eq!(repo.get_metadata("schema").await.unwrap().as_deref(), Some("v2"));
}

#[tokio::test]
async fn unreadable_refresh_marker_counts_as_never_refreshed() {
    let (repo, _dir) = setup_test_db(5000).await;
    repo.set_metadata("last_refresh_zhaopin", "yesterday-ish")
        .await
        .unwrap();

    assert!(repo.get_last_refresh("zhaopin").await.unwrap().is_none());
    assert!(repo.is_stale("zhaopin", 24).await.unwrap());
}

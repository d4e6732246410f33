use chrono::{TimeDelta, Utc};
use jobscout_core::traits::JobStore;

use crate::integration::common::{job, setup_test_db};

#[tokio::test]
async fn upsert_and_get_round_trips_all_fields() {
    let (repo, _dir) = setup_test_db(5000).await;

    let mut record = job(1, "zhaopin", Utc::now());
    record.title = "高级Rust工程师".into();
    record.location = "Shanghai".into();
    record.salary_range = Some("20k-35k".into());
    record.experience = Some("3-5 years".into());
    record.education = Some("Bachelor".into());
    record.description = Some("负责分布式存储".into());
    record.requirements = vec!["熟悉Rust".into(), "熟悉Linux".into()];
    record.tags = vec!["Rust".into(), "Linux".into()];
    record.posted_date = Some(Utc::now() - TimeDelta::days(2));

    assert_eq!(repo.upsert_jobs(std::slice::from_ref(&record)).await.unwrap(), 1);

    let loaded = repo.get_job(&record.id).await.unwrap().expect("record stored");
    assert_eq!(loaded.title, record.title);
    assert_eq!(loaded.location, "Shanghai");
    assert_eq!(loaded.salary_range.as_deref(), Some("20k-35k"));
    assert_eq!(loaded.requirements, record.requirements);
    assert_eq!(loaded.tags, record.tags);
    assert_eq!(loaded.url, record.url);
    assert!(loaded.posted_date.is_some());
    assert!(loaded.is_active);
    assert_eq!(
        loaded.fetched_at.timestamp_micros(),
        record.fetched_at.timestamp_micros()
    );

    assert!(repo.get_job("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_is_idempotent_and_replaces() {
    let (repo, _dir) = setup_test_db(5000).await;
    let mut record = job(1, "zhaopin", Utc::now());

    repo.upsert_jobs(std::slice::from_ref(&record)).await.unwrap();
    repo.upsert_jobs(std::slice::from_ref(&record)).await.unwrap();
    assert_eq!(repo.job_count(None).await.unwrap(), 1);

    record.salary_range = Some("30k-40k".into());
    repo.upsert_jobs(std::slice::from_ref(&record)).await.unwrap();

    assert_eq!(repo.job_count(None).await.unwrap(), 1);
    let loaded = repo.get_job(&record.id).await.unwrap().unwrap();
    assert_eq!(loaded.salary_range.as_deref(), Some("30k-40k"));
}

#[tokio::test]
async fn get_jobs_orders_newest_first_and_pages() {
    let (repo, _dir) = setup_test_db(5000).await;
    let now = Utc::now();
    let jobs = vec![
        job(1, "zhaopin", now - TimeDelta::hours(3)),
        job(2, "zhaopin", now - TimeDelta::hours(1)),
        job(3, "linkedin", now - TimeDelta::hours(2)),
    ];
    repo.upsert_jobs(&jobs).await.unwrap();

    let all = repo.get_jobs(None, 10, 0).await.unwrap();
    let titles: Vec<&str> = all.iter().map(|j| j.title.as_str()).collect();
    assert_eq!(titles, vec!["Rust Engineer 2", "Rust Engineer 3", "Rust Engineer 1"]);

    let zhaopin = repo.get_jobs(Some("zhaopin"), 10, 0).await.unwrap();
    assert_eq!(zhaopin.len(), 2);

    let second_page = repo.get_jobs(None, 1, 1).await.unwrap();
    assert_eq!(second_page[0].title, "Rust Engineer 3");
}

#[tokio::test]
async fn inactive_records_are_not_listed() {
    let (repo, _dir) = setup_test_db(5000).await;
    let mut hidden = job(1, "zhaopin", Utc::now());
    hidden.is_active = false;
    repo.upsert_jobs(&[hidden, job(2, "zhaopin", Utc::now())])
        .await
        .unwrap();

    assert_eq!(repo.get_jobs(None, 10, 0).await.unwrap().len(), 1);
    assert_eq!(repo.search_jobs("rust", None, 10).await.unwrap().len(), 1);
    assert_eq!(repo.job_count(None).await.unwrap(), 1);
    assert_eq!(repo.job_count(Some("zhaopin")).await.unwrap(), 1);
}

#[tokio::test]
async fn search_matches_title_company_description_and_tags() {
    let (repo, _dir) = setup_test_db(5000).await;
    let now = Utc::now();

    let mut by_title = job(1, "zhaopin", now);
    by_title.title = "Golang Developer".into();
    let mut by_company = job(2, "zhaopin", now);
    by_company.title = "Engineer".into();
    by_company.company = "GoPlus Labs".into();
    let mut by_description = job(3, "linkedin", now);
    by_description.title = "Engineer".into();
    by_description.description = Some("Services written in GO".into());
    let mut by_tag = job(4, "linkedin", now);
    by_tag.title = "Engineer".into();
    by_tag.tags = vec!["Go".into()];
    let mut unrelated = job(5, "linkedin", now);
    unrelated.title = "Accountant".into();
    unrelated.company = "Finance Ltd".into();

    repo.upsert_jobs(&[by_title, by_company, by_description, by_tag, unrelated])
        .await
        .unwrap();

    assert_eq!(repo.search_jobs("go", None, 10).await.unwrap().len(), 4);
    assert_eq!(repo.search_jobs("GO", Some("linkedin"), 10).await.unwrap().len(), 2);
    assert_eq!(repo.search_jobs("go", None, 1).await.unwrap().len(), 1);
    assert!(repo.search_jobs("100%", None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_matches_chinese_text() {
    let (repo, _dir) = setup_test_db(5000).await;
    let mut record = job(1, "zhaopin", Utc::now());
    record.title = "后端开发工程师".into();
    repo.upsert_jobs(&[record]).await.unwrap();

    assert_eq!(repo.search_jobs("后端", None, 10).await.unwrap().len(), 1);
    assert!(repo.search_jobs("前端", None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn expire_deletes_only_old_records() {
    let (repo, _dir) = setup_test_db(5000).await;
    let now = Utc::now();
    repo.upsert_jobs(&[
        job(1, "zhaopin", now - TimeDelta::days(40)),
        job(2, "zhaopin", now - TimeDelta::days(31)),
        job(3, "zhaopin", now - TimeDelta::days(2)),
    ])
    .await
    .unwrap();

    let deleted = repo.expire_older_than(30).await.unwrap();

    assert_eq!(deleted, 2);
    let left = repo.get_jobs(None, 10, 0).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].title, "Rust Engineer 3");
}

#[tokio::test]
async fn expire_zero_days_clears_everything_fetched_before_now() {
    let (repo, _dir) = setup_test_db(5000).await;
    repo.upsert_jobs(&[job(1, "zhaopin", Utc::now() - TimeDelta::seconds(5))])
        .await
        .unwrap();

    assert_eq!(repo.expire_older_than(0).await.unwrap(), 1);
    assert_eq!(repo.job_count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn health_check_succeeds() {
    let (repo, _dir) = setup_test_db(5000).await;
    repo.health_check().await.unwrap();
}

mod common;

use common::setup_db;
use course_sync::db::repository;
use course_sync::models::{CourseFields, Offering, OfferingFields};
use course_sync::services::{RunStatus, repair_orphans};
use sqlx::SqlitePool;

async fn seed_course(pool: &SqlitePool, course_id: &str) -> i64 {
    repository::insert_course(
        pool,
        &CourseFields {
            course_id: course_id.to_string(),
            description_format: "full_html".to_string(),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to seed course")
    .id
}

async fn seed_offering(pool: &SqlitePool, section_id: &str) -> Offering {
    repository::insert_offering(
        pool,
        &OfferingFields {
            section_id: section_id.to_string(),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to seed offering")
}

async fn listed(pool: &SqlitePool, course_id: i64) -> Vec<String> {
    repository::fetch_course_offerings(pool, course_id)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.section_id)
        .collect()
}

#[tokio::test]
async fn test_orphans_are_attached_to_resolved_parents() {
    let pool = setup_db().await;
    let blaw = seed_course(&pool, "BLAW-1000").await;
    let abc = seed_course(&pool, "ABC-123").await;

    let attached = seed_offering(&pool, "BLAW-1000-000").await;
    repository::set_course_offerings(&pool, blaw, &[attached.reference()]).await.unwrap();

    seed_offering(&pool, "BLAW-1000-001").await;
    seed_offering(&pool, "BLAW-1000-002").await;
    seed_offering(&pool, "ABC-123-45-001").await;
    seed_offering(&pool, "ZZZ-9-001").await;

    let report = repair_orphans(&pool).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.orphans, 4);
    assert_eq!(report.attached, 3);
    assert_eq!(report.courses_updated, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.unmapped, vec!["ZZZ-9-001".to_string()]);

    assert_eq!(
        listed(&pool, blaw).await,
        vec!["BLAW-1000-000", "BLAW-1000-001", "BLAW-1000-002"]
    );
    assert_eq!(listed(&pool, abc).await, vec!["ABC-123-45-001"]);
}

#[tokio::test]
async fn test_second_pass_attaches_nothing() {
    let pool = setup_db().await;
    let blaw = seed_course(&pool, "BLAW-1000").await;
    seed_offering(&pool, "BLAW-1000-001").await;
    seed_offering(&pool, "BLAW-1000-002").await;

    let first = repair_orphans(&pool).await;
    assert_eq!(first.attached, 2);
    let before = listed(&pool, blaw).await;

    let second = repair_orphans(&pool).await;
    assert_eq!(second.orphans, 0);
    assert_eq!(second.attached, 0);
    assert_eq!(second.courses_updated, 0);
    assert_eq!(listed(&pool, blaw).await, before);
}

#[tokio::test]
async fn test_exact_course_id_match_wins() {
    let pool = setup_db().await;
    let short = seed_course(&pool, "BLAW-1000").await;
    let exact = seed_course(&pool, "101975").await;
    seed_offering(&pool, "101975").await;

    let report = repair_orphans(&pool).await;

    assert_eq!(report.attached, 1);
    assert_eq!(listed(&pool, exact).await, vec!["101975"]);
    assert!(listed(&pool, short).await.is_empty());
}

#[tokio::test]
async fn test_unmapped_orphans_are_reported_each_pass() {
    let pool = setup_db().await;
    seed_offering(&pool, "NOPE-1-001").await;

    let first = repair_orphans(&pool).await;
    let second = repair_orphans(&pool).await;

    assert_eq!(first.unmapped, vec!["NOPE-1-001".to_string()]);
    assert_eq!(second.unmapped, vec!["NOPE-1-001".to_string()]);
    assert_eq!(second.attached, 0);
    assert_eq!(second.status, RunStatus::Completed);

    let overview = repository::fetch_overview(&pool).await.unwrap();
    assert_eq!(overview.orphaned_offerings, 1);
}

#[tokio::test]
async fn test_each_pass_is_recorded() {
    let pool = setup_db().await;

    repair_orphans(&pool).await;

    let runs = repository::fetch_sync_runs(&pool, 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].kind, "orphans");
    assert_eq!(runs[0].status, "completed");
}

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{UnreachableCatalog, course, setup_db};
use course_sync::db::repository;
use course_sync::services::{Notifier, RunStatus, SyncOptions, SyncScheduler};
use course_sync::upstream::StaticCatalogClient;
use serde_json::json;

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, subject: &str, body: &str) {
        self.sent.lock().unwrap().push((subject.to_string(), body.to_string()));
    }
}

#[tokio::test]
async fn test_scheduler_initialization() {
    let pool = setup_db().await;
    let catalog = Arc::new(StaticCatalogClient::new(Vec::new()));

    let scheduler = SyncScheduler::new(pool, catalog, SyncOptions::default(), Duration::from_secs(10));

    assert_eq!(scheduler.interval(), Duration::from_secs(10));
}

#[tokio::test]
async fn test_run_once_refreshes_repairs_and_notifies() {
    let pool = setup_db().await;
    let catalog = Arc::new(StaticCatalogClient::new(vec![course(json!({
        "Course_ID": "BLAW-1000",
        "CourseSections": [{ "CourseSec_ID": "BLAW-1000-001" }]
    }))]));
    let notifier = Arc::new(RecordingNotifier::default());

    let scheduler = SyncScheduler::new(pool.clone(), catalog, SyncOptions::default(), Duration::from_secs(60))
        .with_notifier(notifier.clone());

    let (refresh, orphans) = scheduler.run_once().await;

    assert_eq!(refresh.status, RunStatus::Completed);
    assert_eq!(refresh.created, 1);
    assert_eq!(orphans.attached, 0);

    {
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "Catalog sync completed");
        assert!(sent[0].1.contains("1 created"));
    }

    let runs = repository::fetch_sync_runs(&pool, 10).await.unwrap();
    assert_eq!(runs.len(), 2);
}

#[tokio::test]
async fn test_failed_refresh_is_notified_with_diagnostic() {
    let pool = setup_db().await;
    let notifier = Arc::new(RecordingNotifier::default());

    let scheduler = SyncScheduler::new(
        pool,
        Arc::new(UnreachableCatalog),
        SyncOptions::default(),
        Duration::from_secs(60),
    )
    .with_notifier(notifier.clone());

    let (refresh, _) = scheduler.run_once().await;

    assert_eq!(refresh.status, RunStatus::Failed);
    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent[0].0, "Catalog sync failed");
    assert!(sent[0].1.contains("Diagnostic: Network error"));
}

#[tokio::test]
async fn test_scheduler_short_interval() {
    let pool = setup_db().await;
    let catalog = Arc::new(StaticCatalogClient::new(Vec::new()));
    let notifier = Arc::new(RecordingNotifier::default());

    let scheduler = SyncScheduler::new(pool, catalog, SyncOptions::default(), Duration::from_millis(100))
        .with_notifier(notifier.clone());

    let scheduler_task = tokio::spawn(async move {
        scheduler.start().await;
    });

    tokio::time::sleep(Duration::from_millis(450)).await;
    scheduler_task.abort();

    assert!(!notifier.sent.lock().unwrap().is_empty());
}

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::services::notify::{LogNotifier, Notifier};
use crate::services::orphans::repair_orphans;
use crate::services::report::{OrphanReport, RunReport, RunStatus};
use crate::services::sync_service::{SyncOptions, SyncService};
use crate::upstream::CatalogClient;

/// Periodic catalog refresh followed by orphan repair.
pub struct SyncScheduler {
    db: SqlitePool,
    catalog: Arc<dyn CatalogClient>,
    options: SyncOptions,
    interval: Duration,
    run_lock: Arc<Mutex<()>>,
    notifier: Arc<dyn Notifier>,
}

impl SyncScheduler {
    pub fn new(
        db: SqlitePool,
        catalog: Arc<dyn CatalogClient>,
        options: SyncOptions,
        interval: Duration,
    ) -> Self {
        Self {
            db,
            catalog,
            options,
            interval,
            run_lock: Arc::new(Mutex::new(())),
            notifier: Arc::new(LogNotifier::new(None)),
        }
    }

    /// Shares the writer lock with other entry points (the HTTP surface).
    pub fn with_run_lock(mut self, run_lock: Arc<Mutex<()>>) -> Self {
        self.run_lock = run_lock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs forever, sleeping one interval before each run.
    pub async fn start(self) {
        info!("Starting catalog sync scheduler (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            let (refresh, orphans) = self.run_once().await;
            if refresh.status == RunStatus::Failed {
                warn!(
                    "Scheduled refresh failed: {}",
                    refresh.diagnostic.as_deref().unwrap_or("unknown error")
                );
            } else {
                info!(
                    "Scheduled sync completed - Created: {} | Updated: {} | Archived: {} | Attached: {}",
                    refresh.created, refresh.updated, refresh.archived, orphans.attached
                );
            }
        }
    }

    /// One refresh plus orphan repair under the run lock, then a notification.
    pub async fn run_once(&self) -> (RunReport, OrphanReport) {
        let (refresh, orphans) = {
            let _guard = self.run_lock.lock().await;
            let service = SyncService::new(self.db.clone(), self.catalog.clone(), self.options.clone());
            let refresh = service.refresh().await;
            let orphans = repair_orphans(&self.db).await;
            (refresh, orphans)
        };

        let subject = format!("Catalog sync {}", refresh.status.as_str());
        let mut body = format!("{}\n{}", refresh.summary(), orphans.summary());
        if let Some(diagnostic) = &refresh.diagnostic {
            body.push_str(&format!("\nDiagnostic: {}", diagnostic));
        }
        self.notifier.notify(&subject, &body).await;

        (refresh, orphans)
    }
}

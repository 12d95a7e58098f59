use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::error;
use uuid::Uuid;

use crate::db::repository;
use crate::models::SyncRun;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Completed,
    CompletedWithErrors,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithErrors => "completed_with_errors",
            RunStatus::Failed => "failed",
        }
    }

    /// Status of a run whose fetch succeeded.
    pub fn from_failures(failures: usize) -> Self {
        if failures == 0 {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithErrors
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Refresh,
    Orphans,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Refresh => "refresh",
            RunKind::Orphans => "orphans",
        }
    }
}

/// Outcome of one full catalog refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub created: usize,
    pub updated: usize,
    pub republished: usize,
    pub failed: usize,
    pub archived: usize,
    pub offerings_created: usize,
    pub offerings_updated: usize,
    pub offerings_failed: usize,
    /// Catalog entries that were not valid course objects.
    pub rejected: usize,
    pub archival_skipped: bool,
    /// What went wrong, when the run failed.
    pub diagnostic: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

impl RunReport {
    pub fn start() -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            run_id: Uuid::new_v4().to_string(),
            status: RunStatus::Completed,
            created: 0,
            updated: 0,
            republished: 0,
            failed: 0,
            archived: 0,
            offerings_created: 0,
            offerings_updated: 0,
            offerings_failed: 0,
            rejected: 0,
            archival_skipped: false,
            diagnostic: None,
            started_at: now.clone(),
            finished_at: now,
        }
    }

    pub fn failures(&self) -> usize {
        self.failed + self.offerings_failed + self.rejected
    }

    pub fn to_sync_run(&self) -> SyncRun {
        SyncRun {
            id: self.run_id.clone(),
            kind: RunKind::Refresh.as_str().to_string(),
            status: self.status.as_str().to_string(),
            summary: self.summary(),
            diagnostic: self.diagnostic.clone(),
            started_at: self.started_at.clone(),
            finished_at: self.finished_at.clone(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "courses: {} created, {} updated, {} republished, {} failed, {} archived{} | offerings: {} created, {} updated, {} failed | {} rejected",
            self.created,
            self.updated,
            self.republished,
            self.failed,
            self.archived,
            if self.archival_skipped { " (archival skipped)" } else { "" },
            self.offerings_created,
            self.offerings_updated,
            self.offerings_failed,
            self.rejected,
        )
    }
}

/// Outcome of one orphan repair pass.
#[derive(Debug, Clone, Serialize)]
pub struct OrphanReport {
    pub run_id: String,
    pub status: RunStatus,
    pub orphans: usize,
    pub attached: usize,
    pub courses_updated: usize,
    pub failed: usize,
    pub unmapped: Vec<String>,
    pub diagnostic: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

impl OrphanReport {
    pub fn start() -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            run_id: Uuid::new_v4().to_string(),
            status: RunStatus::Completed,
            orphans: 0,
            attached: 0,
            courses_updated: 0,
            failed: 0,
            unmapped: Vec::new(),
            diagnostic: None,
            started_at: now.clone(),
            finished_at: now,
        }
    }

    pub fn to_sync_run(&self) -> SyncRun {
        SyncRun {
            id: self.run_id.clone(),
            kind: RunKind::Orphans.as_str().to_string(),
            status: self.status.as_str().to_string(),
            summary: self.summary(),
            diagnostic: self.diagnostic.clone(),
            started_at: self.started_at.clone(),
            finished_at: self.finished_at.clone(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "orphans: {} found, {} attached to {} courses, {} failed, {} unmapped",
            self.orphans,
            self.attached,
            self.courses_updated,
            self.failed,
            self.unmapped.len(),
        )
    }
}

/// Writes the audit row for a finished run. Failures are logged, never raised.
pub async fn record_run(db: &SqlitePool, run: SyncRun) {
    if let Err(e) = repository::insert_sync_run(db, &run).await {
        error!("Failed to record {} run {}: {}", run.kind, run.id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_failures() {
        assert_eq!(RunStatus::from_failures(0), RunStatus::Completed);
        assert_eq!(RunStatus::from_failures(3), RunStatus::CompletedWithErrors);
    }

    #[test]
    fn test_status_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&RunStatus::CompletedWithErrors).unwrap(),
            "\"COMPLETED_WITH_ERRORS\""
        );
    }

    #[test]
    fn test_summary_mentions_skipped_archival() {
        let mut report = RunReport::start();
        report.created = 2;
        report.archival_skipped = true;
        let summary = report.summary();
        assert!(summary.contains("2 created"));
        assert!(summary.contains("archival skipped"));
    }
}

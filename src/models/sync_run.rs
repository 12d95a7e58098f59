use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Audit record of one refresh or orphan-repair run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncRun {
    pub id: String,
    pub kind: String,
    pub status: String,
    pub summary: String,
    pub diagnostic: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOverview {
    pub courses: i64,
    pub published_courses: i64,
    pub offerings: i64,
    pub courses_with_offerings: i64,
    pub orphaned_offerings: i64,
}

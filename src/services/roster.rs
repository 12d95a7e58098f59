//! Tracks which courses the catalog currently lists and archives the rest.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::db::repository;
use crate::services::transform::course_key;
use crate::upstream::CatalogSnapshot;

/// Course ids seen in one successful catalog fetch.
///
/// Only a [`CatalogSnapshot`] can produce a roster, so a failed fetch never
/// reaches archival. Rejected entries with a readable id still count as listed.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    course_ids: HashSet<String>,
    /// Some rejected entry had no readable id, so absence proves nothing.
    incomplete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    pub archived: usize,
    pub failed: usize,
    /// Set when archival did not run at all.
    pub skipped: bool,
}

impl Roster {
    pub fn from_snapshot(snapshot: &CatalogSnapshot) -> Self {
        Self {
            course_ids: snapshot
                .courses
                .iter()
                .filter_map(course_key)
                .chain(snapshot.rejected_course_ids.iter().map(String::as_str))
                .map(str::to_string)
                .collect(),
            incomplete: snapshot.has_unidentified_rejections(),
        }
    }

    pub fn current_upstream_ids(&self) -> &HashSet<String> {
        &self.course_ids
    }

    pub fn len(&self) -> usize {
        self.course_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.course_ids.is_empty()
    }

    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }
}

/// Archives every active course missing from `roster`. Courses are never deleted.
///
/// An empty or incomplete roster skips archival entirely.
pub async fn archive_missing(db: &SqlitePool, roster: &Roster) -> Result<ArchiveSummary, sqlx::Error> {
    if roster.is_empty() {
        warn!("Catalog returned no courses; skipping archival");
        return Ok(ArchiveSummary { skipped: true, ..Default::default() });
    }
    if roster.is_incomplete() {
        warn!("Catalog entries without a readable Course_ID were rejected; skipping archival");
        return Ok(ArchiveSummary { skipped: true, ..Default::default() });
    }

    let mut summary = ArchiveSummary::default();
    for (id, course_id) in repository::fetch_active_courses(db).await? {
        if roster.current_upstream_ids().contains(&course_id) {
            continue;
        }
        match repository::archive_course(db, id).await {
            Ok(true) => {
                info!("Archived course {} (no longer in catalog)", course_id);
                summary.archived += 1;
            }
            Ok(false) => {}
            Err(e) => {
                error!("Failed to archive course {}: {}", course_id, e);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

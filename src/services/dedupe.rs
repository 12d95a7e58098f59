//! One-off cleanup for offerings that share a section id.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::db::repository;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupeReport {
    pub sections: usize,
    pub removed: usize,
    pub failed: usize,
    pub applied: bool,
}

/// Keeps the lowest offering id per section and folds the others into it.
///
/// With `apply == false` nothing is written; the report counts what would be removed.
pub async fn remove_duplicate_offerings(db: &SqlitePool, apply: bool) -> Result<DedupeReport, sqlx::Error> {
    let duplicates = repository::fetch_duplicate_sections(db).await?;
    let mut report = DedupeReport {
        sections: duplicates.len(),
        applied: apply,
        ..Default::default()
    };

    for (section_id, keys) in duplicates {
        let Some((keep, rest)) = keys.split_first() else {
            continue;
        };
        info!(
            "Section {}: keeping offering {}, {} duplicates",
            section_id,
            keep.id,
            rest.len()
        );

        for duplicate in rest {
            if !apply {
                info!("[DRY RUN] Would remove offering {} -> {}", duplicate.id, keep.id);
                report.removed += 1;
                continue;
            }
            match repository::merge_duplicate_offering(db, keep.reference(), duplicate.id).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    error!("Failed to remove duplicate offering {}: {}", duplicate.id, e);
                    report.failed += 1;
                }
            }
        }
    }

    Ok(report)
}

//! Re-attaches offerings that no course references.

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::db::repository;
use crate::error::SyncError;
use crate::models::OfferingRef;
use crate::services::identity::CourseIndex;
use crate::services::report::{OrphanReport, RunStatus, record_run};
use crate::services::transform::merge_refs;

/// Orphans resolved to one parent course.
#[derive(Debug, Default)]
struct OrphanGroup {
    course_id: String,
    refs: Vec<OfferingRef>,
}

/// Attaches every orphaned offering to the course its section id resolves to.
///
/// Safe to run at any time. Unresolvable section ids are reported in
/// `unmapped` and left alone. A storage failure while scanning marks the
/// pass FAILED.
pub async fn repair_orphans(db: &SqlitePool) -> OrphanReport {
    let mut report = OrphanReport::start();

    if let Err(e) = scan_and_attach(db, &mut report).await {
        error!("Orphan repair aborted: {}", e);
        report.status = RunStatus::Failed;
        report.diagnostic = Some(e.to_string());
    } else {
        report.status = RunStatus::from_failures(report.failed);
    }

    report.finished_at = Utc::now().to_rfc3339();
    info!("Orphan repair finished ({}): {}", report.status.as_str(), report.summary());
    record_run(db, report.to_sync_run()).await;
    report
}

async fn scan_and_attach(db: &SqlitePool, report: &mut OrphanReport) -> Result<(), SyncError> {
    let orphans = repository::fetch_orphan_offerings(db).await?;
    report.orphans = orphans.len();
    if orphans.is_empty() {
        info!("No orphaned offerings found");
        return Ok(());
    }
    info!("Found {} orphaned offerings", orphans.len());

    let index = CourseIndex::new(repository::course_id_index(db).await?);

    let mut groups: BTreeMap<i64, OrphanGroup> = BTreeMap::new();
    for orphan in &orphans {
        match index.resolve_parent(&orphan.section_id) {
            Some(parent) => {
                let group = groups.entry(parent.id).or_default();
                group.course_id = parent.course_id;
                group.refs.push(orphan.reference());
            }
            None => {
                warn!("{}", SyncError::UnmappedOrphan(orphan.section_id.clone()));
                report.unmapped.push(orphan.section_id.clone());
            }
        }
    }

    for (id, group) in groups {
        match attach(db, id, &group.refs).await {
            Ok(0) => {}
            Ok(added) => {
                info!("Attached {} offerings to course {}", added, group.course_id);
                report.attached += added;
                report.courses_updated += 1;
            }
            Err(e) => {
                error!("Failed to attach offerings to course {}: {}", group.course_id, e);
                report.failed += group.refs.len();
            }
        }
    }

    if !report.unmapped.is_empty() {
        warn!("{} orphaned offerings have no parent course", report.unmapped.len());
    }
    Ok(())
}

/// Merges `refs` into the course's list; writes only when the list grew.
async fn attach(db: &SqlitePool, course_id: i64, refs: &[OfferingRef]) -> Result<usize, sqlx::Error> {
    let existing = repository::course_offering_refs(db, course_id).await?;
    let merged = merge_refs(&existing, refs);
    let added = merged.len().saturating_sub(existing.len());
    if added > 0 {
        repository::set_course_offerings(db, course_id, &merged).await?;
    }
    Ok(added)
}

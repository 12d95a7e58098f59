use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::db::repository;
use crate::error::SyncError;
use crate::models::{Course, Offering, OfferingRef};
use crate::services::report::{RunReport, RunStatus, record_run};
use crate::services::roster::{self, Roster};
use crate::services::transform::{self, TERM_VOCABULARY};
use crate::upstream::{CatalogClient, CourseRecord, SectionRecord};

/// Knobs of a refresh run, split out of [`SyncConfig`] so tests can build them directly.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub batch_size: usize,
    pub probe_before_fetch: bool,
    pub verbose: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: 25,
            probe_before_fetch: false,
            verbose: false,
        }
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            probe_before_fetch: config.probe_before_fetch,
            verbose: config.verbose,
        }
    }
}

/// Where a catalog course stands locally before it is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum CourseState {
    New,
    ExistingActive(Course),
    ExistingArchived(Course),
}

impl CourseState {
    pub fn classify(existing: Option<Course>) -> Self {
        match existing {
            None => CourseState::New,
            Some(course) if course.published && !course.archived => CourseState::ExistingActive(course),
            Some(course) => CourseState::ExistingArchived(course),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CourseOutcome {
    Created,
    Updated,
    Republished,
}

/// State scoped to a single run: counters plus lookup caches.
#[derive(Debug)]
struct RunContext {
    report: RunReport,
    campuses: HashMap<String, Option<i64>>,
    terms: HashMap<String, i64>,
}

impl RunContext {
    fn new() -> Self {
        Self {
            report: RunReport::start(),
            campuses: HashMap::new(),
            terms: HashMap::new(),
        }
    }
}

pub struct SyncService {
    db: SqlitePool,
    catalog: Arc<dyn CatalogClient>,
    options: SyncOptions,
}

impl SyncService {
    pub fn new(db: SqlitePool, catalog: Arc<dyn CatalogClient>, options: SyncOptions) -> Self {
        Self { db, catalog, options }
    }

    /// Full refresh: fetch, reconcile every course, then archive what the catalog dropped.
    ///
    /// Fetch failures produce a FAILED report and no writes. Per-record
    /// failures are logged, counted and skipped.
    pub async fn refresh(&self) -> RunReport {
        info!("Starting catalog refresh...");
        let mut ctx = RunContext::new();

        info!("Step 1: Fetching catalog");
        let snapshot = match self.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.fail(ctx.report, e).await,
        };
        ctx.report.rejected = snapshot.rejected.len();
        let roster = Roster::from_snapshot(&snapshot);
        info!(
            "Fetched {} courses, {} listed upstream ({} rejected entries)",
            snapshot.courses.len(),
            roster.len(),
            snapshot.rejected.len()
        );

        info!("Step 2: Reconciling courses");
        let batch_size = self.options.batch_size.max(1);
        let total = snapshot.courses.len();
        for (batch, chunk) in snapshot.courses.chunks(batch_size).enumerate() {
            for record in chunk {
                self.apply_course(&mut ctx, record).await;
            }
            info!(
                "Processed {}/{} courses (batch {})",
                (batch * batch_size + chunk.len()).min(total),
                total,
                batch + 1
            );
        }

        info!("Step 3: Archiving courses missing from catalog");
        match roster::archive_missing(&self.db, &roster).await {
            Ok(summary) => {
                ctx.report.archived = summary.archived;
                ctx.report.failed += summary.failed;
                ctx.report.archival_skipped = summary.skipped;
            }
            Err(e) => {
                error!("Archival pass failed: {}", e);
                ctx.report.archival_skipped = true;
                ctx.report.failed += 1;
            }
        }

        let mut report = ctx.report;
        report.status = RunStatus::from_failures(report.failures());
        report.finished_at = Utc::now().to_rfc3339();
        info!("Refresh finished ({}): {}", report.status.as_str(), report.summary());
        record_run(&self.db, report.to_sync_run()).await;
        report
    }

    async fn fetch(&self) -> Result<crate::upstream::CatalogSnapshot, SyncError> {
        if self.options.probe_before_fetch {
            self.catalog.probe().await?;
        }
        self.catalog.fetch_courses().await
    }

    async fn fail(&self, mut report: RunReport, err: SyncError) -> RunReport {
        error!("Catalog refresh failed before any writes: {}", err);
        report.status = RunStatus::Failed;
        report.diagnostic = Some(err.to_string());
        report.finished_at = Utc::now().to_rfc3339();
        record_run(&self.db, report.to_sync_run()).await;
        report
    }

    async fn apply_course(&self, ctx: &mut RunContext, record: &CourseRecord) {
        match self.reconcile_course(ctx, record).await {
            Ok(CourseOutcome::Created) => ctx.report.created += 1,
            Ok(CourseOutcome::Updated) => ctx.report.updated += 1,
            Ok(CourseOutcome::Republished) => ctx.report.republished += 1,
            Err(e) => {
                error!("{}", e);
                ctx.report.failed += 1;
            }
        }
    }

    async fn reconcile_course(
        &self,
        ctx: &mut RunContext,
        record: &CourseRecord,
    ) -> Result<CourseOutcome, SyncError> {
        let course_id = transform::course_key(record)
            .ok_or_else(|| SyncError::record("<missing>", "course has no Course_ID"))?;
        let fields = transform::course_fields(course_id, record);

        let existing = repository::find_course_by_course_id(&self.db, course_id)
            .await
            .map_err(|e| SyncError::record(course_id, e))?;

        let (course, outcome) = match CourseState::classify(existing) {
            CourseState::New => {
                let course = repository::insert_course(&self.db, &fields)
                    .await
                    .map_err(|e| SyncError::record(course_id, e))?;
                debug!("Created course {}", course_id);
                (course, CourseOutcome::Created)
            }
            CourseState::ExistingArchived(current) => {
                warn!("Re-publishing archived course {} (reappeared in catalog)", course_id);
                let course = repository::update_course(&self.db, current.id, &fields, true)
                    .await
                    .map_err(|e| SyncError::record(course_id, e))?;
                (course, CourseOutcome::Republished)
            }
            CourseState::ExistingActive(current) => {
                let course = repository::update_course(&self.db, current.id, &fields, false)
                    .await
                    .map_err(|e| SyncError::record(course_id, e))?;
                (course, CourseOutcome::Updated)
            }
        };

        for problem in &record.rejected_sections {
            error!("{}", SyncError::record(course_id, problem));
            ctx.report.offerings_failed += 1;
        }

        let mut refs = transform::dedupe_refs(self.reconcile_offerings(ctx, &record.sections).await);
        if !record.rejected_sections.is_empty() {
            // A rejected section may still own an attached offering; keep the old list entries.
            let current = repository::course_offering_refs(&self.db, course.id)
                .await
                .map_err(|e| SyncError::record(course_id, e))?;
            refs = transform::merge_refs(&refs, &current);
        }
        repository::set_course_offerings(&self.db, course.id, &refs)
            .await
            .map_err(|e| SyncError::record(course_id, format!("failed to assign offerings: {}", e)))?;

        Ok(outcome)
    }

    /// Creates or updates every usable section, returning references in start-date order.
    async fn reconcile_offerings(&self, ctx: &mut RunContext, sections: &[SectionRecord]) -> Vec<OfferingRef> {
        let mut refs = Vec::new();

        for (section_id, section) in transform::ordered_sections(sections) {
            match self.upsert_offering(ctx, section_id, section).await {
                Ok((offering, created)) => {
                    if created {
                        ctx.report.offerings_created += 1;
                    } else {
                        ctx.report.offerings_updated += 1;
                    }
                    refs.push(offering.reference());
                }
                Err(e) => {
                    error!("{}", e);
                    ctx.report.offerings_failed += 1;
                }
            }
        }

        refs
    }

    async fn upsert_offering(
        &self,
        ctx: &mut RunContext,
        section_id: &str,
        section: &SectionRecord,
    ) -> Result<(Offering, bool), SyncError> {
        let wrap = |e: sqlx::Error| SyncError::record(section_id, e);

        let campus_id = match section.location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            Some(location) => self.campus_id(ctx, location).await.map_err(wrap)?,
            None => None,
        };
        let term_id = match section.term.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(term) => Some(self.term_id(ctx, term).await.map_err(wrap)?),
            None => None,
        };
        let fields = transform::offering_fields(section_id, section, campus_id, term_id);

        match repository::find_offering_by_section_id(&self.db, section_id).await.map_err(wrap)? {
            Some(existing) => {
                let offering = repository::update_offering(&self.db, existing.id, &fields)
                    .await
                    .map_err(wrap)?;
                Ok((offering, false))
            }
            None => {
                let offering = repository::insert_offering(&self.db, &fields).await.map_err(wrap)?;
                debug!("Created offering {}", section_id);
                Ok((offering, true))
            }
        }
    }

    /// Campus named `location`, if one exists. The location text is stored either way.
    async fn campus_id(&self, ctx: &mut RunContext, location: &str) -> Result<Option<i64>, sqlx::Error> {
        if let Some(cached) = ctx.campuses.get(location) {
            return Ok(*cached);
        }
        let id = repository::find_campus_by_name(&self.db, location).await?;
        if id.is_none() && self.options.verbose {
            info!("No campus named {:?}; keeping location text", location);
        }
        ctx.campuses.insert(location.to_string(), id);
        Ok(id)
    }

    async fn term_id(&self, ctx: &mut RunContext, term: &str) -> Result<i64, sqlx::Error> {
        if let Some(id) = ctx.terms.get(term) {
            return Ok(*id);
        }
        let id = repository::find_or_create_term(&self.db, TERM_VOCABULARY, term).await?;
        ctx.terms.insert(term.to_string(), id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(published: bool, archived: bool) -> Course {
        Course {
            id: 1,
            course_id: "X-1".to_string(),
            description: None,
            description_format: "full_html".to_string(),
            change_timestamp: None,
            published,
            archived,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_classify_course_state() {
        assert_eq!(CourseState::classify(None), CourseState::New);
        assert!(matches!(
            CourseState::classify(Some(course(true, false))),
            CourseState::ExistingActive(_)
        ));
        assert!(matches!(
            CourseState::classify(Some(course(false, true))),
            CourseState::ExistingArchived(_)
        ));
        // unpublished without the archive flag still needs republishing
        assert!(matches!(
            CourseState::classify(Some(course(false, false))),
            CourseState::ExistingArchived(_)
        ));
    }

    #[test]
    fn test_options_from_config() {
        let config = SyncConfig::from_lookup(|key| match key {
            "CATALOG_API_BASE_URL" => Some("https://catalog.example.edu/api".to_string()),
            "CATALOG_API_TOKEN" => Some("secret".to_string()),
            "SYNC_BATCH_SIZE" => Some("10".to_string()),
            "SYNC_PROBE" => Some("false".to_string()),
            _ => None,
        })
        .unwrap();

        let options = SyncOptions::from(&config);
        assert_eq!(options.batch_size, 10);
        assert!(!options.probe_before_fetch);
    }
}

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{
    Course, CourseFields, Offering, OfferingFields, OfferingKey, OfferingRef, SyncOverview, SyncRun,
};

const COURSE_COLUMNS: &str = "id, course_id, description, description_format, change_timestamp, \
     published, archived, created_at, updated_at";

const OFFERING_COLUMNS: &str = "id, revision_id, section_id, section_name, title, term, term_id, \
     location, campus_id, instructor, start_date, end_date, meeting_times, domestic_tuition, \
     domestic_fee, domestic_fees_other, international_tuition, international_fee, \
     international_fees_other, capacity_flag, credit_type, credit_type_message, offering_type, \
     created_at, updated_at";

pub async fn fetch_courses(db: &SqlitePool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {} FROM courses WHERE published = 1 AND archived = 0 ORDER BY course_id",
        COURSE_COLUMNS
    ))
    .fetch_all(db)
    .await
}

pub async fn fetch_all_courses(db: &SqlitePool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {} FROM courses ORDER BY id", COURSE_COLUMNS))
        .fetch_all(db)
        .await
}

pub async fn find_course(db: &SqlitePool, id: i64) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Looks a course up by its catalog key, preferring non-archived rows.
pub async fn find_course_by_course_id(
    db: &SqlitePool,
    course_id: &str,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {} FROM courses WHERE course_id = ? ORDER BY archived ASC, id ASC LIMIT 1",
        COURSE_COLUMNS
    ))
    .bind(course_id)
    .fetch_optional(db)
    .await
}

/// Maps every catalog key to the row id `find_course_by_course_id` would return.
pub async fn course_id_index(db: &SqlitePool) -> Result<HashMap<String, i64>, sqlx::Error> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT course_id, id FROM courses ORDER BY archived DESC, id DESC")
            .fetch_all(db)
            .await?;

    // later rows win, so the preferred row is inserted last
    Ok(rows.into_iter().collect())
}

pub async fn insert_course(db: &SqlitePool, fields: &CourseFields) -> Result<Course, sqlx::Error> {
    let now = Utc::now().to_rfc3339();

    let id = sqlx::query(
        "INSERT INTO courses (course_id, description, description_format, change_timestamp, published, archived, created_at, updated_at) VALUES (?, ?, ?, ?, 1, 0, ?, ?)"
    )
    .bind(&fields.course_id)
    .bind(&fields.description)
    .bind(&fields.description_format)
    .bind(&fields.change_timestamp)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?
    .last_insert_rowid();

    find_course(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Overwrites the scalar fields of a course; `publish` also clears any archive flag.
///
/// `updated_at` only moves when something actually changed.
pub async fn update_course(
    db: &SqlitePool,
    id: i64,
    fields: &CourseFields,
    publish: bool,
) -> Result<Course, sqlx::Error> {
    let current = find_course(db, id).await?.ok_or(sqlx::Error::RowNotFound)?;

    let published = publish || current.published;
    let archived = !publish && current.archived;
    let changed = current.fields() != *fields
        || current.published != published
        || current.archived != archived;
    let updated_at = if changed {
        Utc::now().to_rfc3339()
    } else {
        current.updated_at.clone()
    };

    sqlx::query(
        "UPDATE courses SET course_id = ?, description = ?, description_format = ?, change_timestamp = ?, published = ?, archived = ?, updated_at = ? WHERE id = ?"
    )
    .bind(&fields.course_id)
    .bind(&fields.description)
    .bind(&fields.description_format)
    .bind(&fields.change_timestamp)
    .bind(published)
    .bind(archived)
    .bind(&updated_at)
    .bind(id)
    .execute(db)
    .await?;

    find_course(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Soft-deletes a course. Returns false when it was already archived.
pub async fn archive_course(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "UPDATE courses SET published = 0, archived = 1, updated_at = ? WHERE id = ? AND (published = 1 OR archived = 0)"
    )
    .bind(now)
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

/// Courses that are currently visible or not yet flagged as archived.
pub async fn fetch_active_courses(db: &SqlitePool) -> Result<Vec<(i64, String)>, sqlx::Error> {
    sqlx::query_as("SELECT id, course_id FROM courses WHERE published = 1 OR archived = 0 ORDER BY id")
        .fetch_all(db)
        .await
}

pub async fn course_offering_refs(db: &SqlitePool, course_id: i64) -> Result<Vec<OfferingRef>, sqlx::Error> {
    sqlx::query_as::<_, OfferingRef>(
        "SELECT offering_id AS target_id, offering_revision_id AS target_revision_id FROM course_offerings WHERE course_id = ? ORDER BY delta"
    )
    .bind(course_id)
    .fetch_all(db)
    .await
}

/// Replaces a course's offering list.
///
/// Offerings in `refs` are detached from any other course first, so an
/// offering never has two owners.
pub async fn set_course_offerings(
    db: &SqlitePool,
    course_id: i64,
    refs: &[OfferingRef],
) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;

    for r in refs {
        let moved = sqlx::query("DELETE FROM course_offerings WHERE offering_id = ? AND course_id != ?")
            .bind(r.target_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if moved > 0 {
            tracing::warn!("Offering {} moved to course {}", r.target_id, course_id);
        }
    }

    sqlx::query("DELETE FROM course_offerings WHERE course_id = ?")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    for (delta, r) in refs.iter().enumerate() {
        sqlx::query(
            "INSERT INTO course_offerings (course_id, delta, offering_id, offering_revision_id) VALUES (?, ?, ?, ?)"
        )
        .bind(course_id)
        .bind(delta as i64)
        .bind(r.target_id)
        .bind(r.target_revision_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

/// Offerings of a course in list order.
pub async fn fetch_course_offerings(db: &SqlitePool, course_id: i64) -> Result<Vec<Offering>, sqlx::Error> {
    let columns: Vec<String> = OFFERING_COLUMNS
        .split(',')
        .map(|c| format!("o.{}", c.trim()))
        .collect();
    sqlx::query_as::<_, Offering>(&format!(
        "SELECT {} FROM course_offerings co JOIN offerings o ON o.id = co.offering_id WHERE co.course_id = ? ORDER BY co.delta",
        columns.join(", ")
    ))
    .bind(course_id)
    .fetch_all(db)
    .await
}

pub async fn find_offering(db: &SqlitePool, id: i64) -> Result<Option<Offering>, sqlx::Error> {
    sqlx::query_as::<_, Offering>(&format!("SELECT {} FROM offerings WHERE id = ?", OFFERING_COLUMNS))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_offering_by_section_id(
    db: &SqlitePool,
    section_id: &str,
) -> Result<Option<Offering>, sqlx::Error> {
    sqlx::query_as::<_, Offering>(&format!(
        "SELECT {} FROM offerings WHERE section_id = ? ORDER BY id LIMIT 1",
        OFFERING_COLUMNS
    ))
    .bind(section_id)
    .fetch_optional(db)
    .await
}

pub async fn insert_offering(db: &SqlitePool, fields: &OfferingFields) -> Result<Offering, sqlx::Error> {
    let now = Utc::now().to_rfc3339();

    let id = sqlx::query(
        "INSERT INTO offerings (revision_id, section_id, section_name, title, term, term_id, location, campus_id, instructor, start_date, end_date, meeting_times, domestic_tuition, domestic_fee, domestic_fees_other, international_tuition, international_fee, international_fees_other, capacity_flag, credit_type, credit_type_message, offering_type, created_at, updated_at) VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&fields.section_id)
    .bind(&fields.section_name)
    .bind(&fields.title)
    .bind(&fields.term)
    .bind(fields.term_id)
    .bind(&fields.location)
    .bind(fields.campus_id)
    .bind(&fields.instructor)
    .bind(&fields.start_date)
    .bind(&fields.end_date)
    .bind(&fields.meeting_times)
    .bind(&fields.domestic_tuition)
    .bind(&fields.domestic_fee)
    .bind(&fields.domestic_fees_other)
    .bind(&fields.international_tuition)
    .bind(&fields.international_fee)
    .bind(&fields.international_fees_other)
    .bind(&fields.capacity_flag)
    .bind(&fields.credit_type)
    .bind(&fields.credit_type_message)
    .bind(&fields.offering_type)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?
    .last_insert_rowid();

    find_offering(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Overwrites every mutable field. A new revision is cut only when content changed.
pub async fn update_offering(
    db: &SqlitePool,
    id: i64,
    fields: &OfferingFields,
) -> Result<Offering, sqlx::Error> {
    let current = find_offering(db, id).await?.ok_or(sqlx::Error::RowNotFound)?;

    let (revision_id, updated_at) = if current.fields() != *fields {
        (current.revision_id + 1, Utc::now().to_rfc3339())
    } else {
        (current.revision_id, current.updated_at.clone())
    };

    sqlx::query(
        "UPDATE offerings SET revision_id = ?, section_id = ?, section_name = ?, title = ?, term = ?, term_id = ?, location = ?, campus_id = ?, instructor = ?, start_date = ?, end_date = ?, meeting_times = ?, domestic_tuition = ?, domestic_fee = ?, domestic_fees_other = ?, international_tuition = ?, international_fee = ?, international_fees_other = ?, capacity_flag = ?, credit_type = ?, credit_type_message = ?, offering_type = ?, updated_at = ? WHERE id = ?"
    )
    .bind(revision_id)
    .bind(&fields.section_id)
    .bind(&fields.section_name)
    .bind(&fields.title)
    .bind(&fields.term)
    .bind(fields.term_id)
    .bind(&fields.location)
    .bind(fields.campus_id)
    .bind(&fields.instructor)
    .bind(&fields.start_date)
    .bind(&fields.end_date)
    .bind(&fields.meeting_times)
    .bind(&fields.domestic_tuition)
    .bind(&fields.domestic_fee)
    .bind(&fields.domestic_fees_other)
    .bind(&fields.international_tuition)
    .bind(&fields.international_fee)
    .bind(&fields.international_fees_other)
    .bind(&fields.capacity_flag)
    .bind(&fields.credit_type)
    .bind(&fields.credit_type_message)
    .bind(&fields.offering_type)
    .bind(&updated_at)
    .bind(id)
    .execute(db)
    .await?;

    find_offering(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Offerings no course references.
pub async fn fetch_orphan_offerings(db: &SqlitePool) -> Result<Vec<OfferingKey>, sqlx::Error> {
    sqlx::query_as::<_, OfferingKey>(
        "SELECT id, revision_id, section_id FROM offerings WHERE id NOT IN (SELECT offering_id FROM course_offerings) ORDER BY section_id, id"
    )
    .fetch_all(db)
    .await
}

/// Section ids held by more than one offering, with the offering ids in ascending order.
pub async fn fetch_duplicate_sections(db: &SqlitePool) -> Result<Vec<(String, Vec<OfferingKey>)>, sqlx::Error> {
    let rows = sqlx::query_as::<_, OfferingKey>(
        "SELECT id, revision_id, section_id FROM offerings WHERE section_id IN (SELECT section_id FROM offerings GROUP BY section_id HAVING COUNT(*) > 1) ORDER BY section_id, id"
    )
    .fetch_all(db)
    .await?;

    let mut grouped: Vec<(String, Vec<OfferingKey>)> = Vec::new();
    for row in rows {
        let same_section = grouped.last().is_some_and(|(section_id, _)| *section_id == row.section_id);
        if same_section {
            if let Some((_, keys)) = grouped.last_mut() {
                keys.push(row);
            }
        } else {
            grouped.push((row.section_id.clone(), vec![row]));
        }
    }
    Ok(grouped)
}

/// Deletes a duplicate offering, pointing its references at `keep` instead.
pub async fn merge_duplicate_offering(
    db: &SqlitePool,
    keep: OfferingRef,
    duplicate_id: i64,
) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;

    // courses that already list the survivor just lose the duplicate
    sqlx::query(
        "DELETE FROM course_offerings WHERE offering_id = ? AND course_id IN (SELECT course_id FROM course_offerings WHERE offering_id = ?)"
    )
    .bind(duplicate_id)
    .bind(keep.target_id)
    .execute(&mut *tx)
    .await?;

    // the survivor may only have one owner
    let owners: Vec<(i64,)> = sqlx::query_as(
        "SELECT course_id FROM course_offerings WHERE offering_id = ? ORDER BY course_id"
    )
    .bind(duplicate_id)
    .fetch_all(&mut *tx)
    .await?;
    let survivor_owned: Option<(i64,)> =
        sqlx::query_as("SELECT course_id FROM course_offerings WHERE offering_id = ? LIMIT 1")
            .bind(keep.target_id)
            .fetch_optional(&mut *tx)
            .await?;

    for (index, (course_id,)) in owners.iter().enumerate() {
        if survivor_owned.is_none() && index == 0 {
            sqlx::query(
                "UPDATE course_offerings SET offering_id = ?, offering_revision_id = ? WHERE offering_id = ? AND course_id = ?"
            )
            .bind(keep.target_id)
            .bind(keep.target_revision_id)
            .bind(duplicate_id)
            .bind(*course_id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("DELETE FROM course_offerings WHERE offering_id = ? AND course_id = ?")
                .bind(duplicate_id)
                .bind(*course_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    sqlx::query("DELETE FROM offerings WHERE id = ?")
        .bind(duplicate_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

pub async fn find_campus_by_name(db: &SqlitePool, name: &str) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM campuses WHERE name = ? LIMIT 1")
        .bind(name)
        .fetch_optional(db)
        .await?;
    Ok(row.map(|(id,)| id))
}

pub async fn insert_campus(db: &SqlitePool, name: &str) -> Result<i64, sqlx::Error> {
    Ok(sqlx::query("INSERT INTO campuses (name) VALUES (?)")
        .bind(name)
        .execute(db)
        .await?
        .last_insert_rowid())
}

pub async fn find_or_create_term(db: &SqlitePool, vocabulary: &str, name: &str) -> Result<i64, sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO taxonomy_terms (vocabulary, name) VALUES (?, ?)")
        .bind(vocabulary)
        .bind(name)
        .execute(db)
        .await?;

    let (id,): (i64,) = sqlx::query_as("SELECT id FROM taxonomy_terms WHERE vocabulary = ? AND name = ?")
        .bind(vocabulary)
        .bind(name)
        .fetch_one(db)
        .await?;
    Ok(id)
}

pub async fn insert_sync_run(db: &SqlitePool, run: &SyncRun) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO sync_runs (id, kind, status, summary, diagnostic, started_at, finished_at) VALUES (?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&run.id)
    .bind(&run.kind)
    .bind(&run.status)
    .bind(&run.summary)
    .bind(&run.diagnostic)
    .bind(&run.started_at)
    .bind(&run.finished_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn fetch_sync_runs(db: &SqlitePool, limit: i64) -> Result<Vec<SyncRun>, sqlx::Error> {
    sqlx::query_as::<_, SyncRun>(
        "SELECT id, kind, status, summary, diagnostic, started_at, finished_at FROM sync_runs ORDER BY finished_at DESC, started_at DESC LIMIT ?"
    )
    .bind(limit)
    .fetch_all(db)
    .await
}

pub async fn fetch_overview(db: &SqlitePool) -> Result<SyncOverview, sqlx::Error> {
    let (courses,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses").fetch_one(db).await?;
    let (published_courses,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM courses WHERE published = 1")
            .fetch_one(db)
            .await?;
    let (offerings,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM offerings").fetch_one(db).await?;
    let (courses_with_offerings,): (i64,) =
        sqlx::query_as("SELECT COUNT(DISTINCT course_id) FROM course_offerings")
            .fetch_one(db)
            .await?;
    let (orphaned_offerings,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM offerings WHERE id NOT IN (SELECT offering_id FROM course_offerings)"
    )
    .fetch_one(db)
    .await?;

    Ok(SyncOverview {
        courses,
        published_courses,
        offerings,
        courses_with_offerings,
        orphaned_offerings,
    })
}

//! Field transforms applied to catalog records before they are stored.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::{CourseFields, DESCRIPTION_FORMAT, OfferingFields, OfferingRef, PRICE_PLACEHOLDER};
use crate::upstream::{CourseRecord, SectionRecord};

/// Vocabulary holding offering terms.
pub const TERM_VOCABULARY: &str = "terms";

/// Trimmed `Course_ID`, if the record has a usable one.
pub fn course_key(record: &CourseRecord) -> Option<&str> {
    record
        .course_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// Pairs rich text with the format it is rendered in.
pub fn formatted_text(value: Option<&str>) -> (Option<String>, String) {
    let text = value.filter(|v| !v.trim().is_empty()).map(str::to_string);
    (text, DESCRIPTION_FORMAT.to_string())
}

pub fn course_fields(course_id: &str, record: &CourseRecord) -> CourseFields {
    let (description, description_format) = formatted_text(record.description.as_deref());
    CourseFields {
        course_id: course_id.to_string(),
        description,
        description_format,
        change_timestamp: record.change_timestamp.clone(),
    }
}

fn text_or(value: &Option<String>, default: &str) -> String {
    value.clone().unwrap_or_else(|| default.to_string())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

/// Builds the stored offering from a catalog section.
///
/// `campus_id` and `term_id` come from lookups the caller already made.
pub fn offering_fields(
    section_id: &str,
    section: &SectionRecord,
    campus_id: Option<i64>,
    term_id: Option<i64>,
) -> OfferingFields {
    OfferingFields {
        section_id: section_id.to_string(),
        section_name: text_or(&section.name, ""),
        title: text_or(&section.title, ""),
        term: text_or(&section.term, ""),
        term_id,
        location: text_or(&section.location, ""),
        campus_id,
        instructor: text_or(&section.instructors, ""),
        start_date: non_blank(&section.start_date),
        end_date: non_blank(&section.end_date),
        meeting_times: section.meeting_times(),
        domestic_tuition: text_or(&section.domestic_price, PRICE_PLACEHOLDER),
        domestic_fee: text_or(&section.domestic_fee, PRICE_PLACEHOLDER),
        domestic_fees_other: text_or(&section.domestic_fee_other, PRICE_PLACEHOLDER),
        international_tuition: text_or(&section.international_price, PRICE_PLACEHOLDER),
        international_fee: text_or(&section.international_fee, PRICE_PLACEHOLDER),
        international_fees_other: text_or(&section.international_fee_other, PRICE_PLACEHOLDER),
        capacity_flag: text_or(&section.over_capacity_flag, ""),
        credit_type: text_or(&section.credit_type, ""),
        credit_type_message: text_or(&section.credit_type_message, ""),
        offering_type: text_or(&section.section_type, ""),
    }
}

/// Sort key for a section start date. Missing or unreadable dates are `None`,
/// which orders before every real date.
pub fn start_sort_key(raw: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    ["%Y-%m-%d", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Usable sections (id present and not the `-1` placeholder), earliest start first.
///
/// The sort is stable, so sections with equal dates keep catalog order.
pub fn ordered_sections(sections: &[SectionRecord]) -> Vec<(&str, &SectionRecord)> {
    let mut usable: Vec<(&str, &SectionRecord)> = sections
        .iter()
        .filter_map(|s| s.usable_section_id().map(|id| (id, s)))
        .collect();
    usable.sort_by_key(|(_, s)| start_sort_key(s.start_date.as_deref()));
    usable
}

/// Drops references to a target already seen. Each target keeps the position of
/// its first occurrence and the newest revision seen for it.
pub fn dedupe_refs(refs: impl IntoIterator<Item = OfferingRef>) -> Vec<OfferingRef> {
    let mut positions: HashMap<i64, usize> = HashMap::new();
    let mut unique: Vec<OfferingRef> = Vec::new();
    for r in refs {
        match positions.get(&r.target_id) {
            Some(&i) => {
                unique[i].target_revision_id = unique[i].target_revision_id.max(r.target_revision_id);
            }
            None => {
                positions.insert(r.target_id, unique.len());
                unique.push(r);
            }
        }
    }
    unique
}

/// Appends `additions` to `existing`, skipping targets already present in either.
pub fn merge_refs(existing: &[OfferingRef], additions: &[OfferingRef]) -> Vec<OfferingRef> {
    dedupe_refs(existing.iter().chain(additions.iter()).copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, start: Option<&str>) -> SectionRecord {
        SectionRecord {
            section_id: Some(id.to_string()),
            start_date: start.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_start_date_sorts_first() {
        let sections = vec![
            section("A", Some("2024-09-01")),
            section("B", None),
            section("C", Some("2024-01-15")),
        ];

        let ids: Vec<&str> = ordered_sections(&sections).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_ordering_skips_placeholder_ids_and_keeps_ties_stable() {
        let sections = vec![
            section("X", Some("2024-01-01T00:00:00")),
            section("-1", Some("2020-01-01")),
            SectionRecord { section_id: None, ..Default::default() },
            section("Y", Some("2024-01-01")),
        ];

        let ids: Vec<&str> = ordered_sections(&sections).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["X", "Y"]);
    }

    #[test]
    fn test_start_sort_key_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(0, 0, 0);
        assert_eq!(start_sort_key(Some("2024-01-15")), expected);
        assert_eq!(start_sort_key(Some("2024-01-15T00:00:00")), expected);
        assert_eq!(start_sort_key(Some("2024-01-15T00:00:00Z")), expected);
        assert_eq!(start_sort_key(Some("01/15/2024")), expected);
        assert_eq!(start_sort_key(Some("soon")), None);
        assert_eq!(start_sort_key(Some("")), None);
        assert_eq!(start_sort_key(None), None);
    }

    #[test]
    fn test_prices_default_to_placeholder() {
        let fields = offering_fields("S1", &section("S1", None), None, None);
        assert_eq!(fields.domestic_tuition, "-");
        assert_eq!(fields.international_fees_other, "-");
        assert_eq!(fields.capacity_flag, "");
        assert_eq!(fields.meeting_times, None);
    }

    #[test]
    fn test_description_is_paired_with_format() {
        let record = CourseRecord {
            course_id: Some(" BLAW-1000 ".to_string()),
            description: Some("<p>Law</p>".to_string()),
            ..Default::default()
        };

        assert_eq!(course_key(&record), Some("BLAW-1000"));
        let fields = course_fields("BLAW-1000", &record);
        assert_eq!(fields.description.as_deref(), Some("<p>Law</p>"));
        assert_eq!(fields.description_format, "full_html");
    }

    #[test]
    fn test_merge_refs_skips_duplicates() {
        let r = |id| OfferingRef { target_id: id, target_revision_id: 1 };
        let merged = merge_refs(&[r(1), r(2)], &[r(2), r(3), r(3)]);
        assert_eq!(merged, vec![r(1), r(2), r(3)]);
        assert_eq!(dedupe_refs(vec![r(5), r(4), r(5)]), vec![r(5), r(4)]);

        let newer = OfferingRef { target_id: 5, target_revision_id: 3 };
        assert_eq!(dedupe_refs(vec![r(5), r(4), newer]), vec![newer, r(4)]);
    }
}

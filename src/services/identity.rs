//! Maps offering section ids to their parent course.
//!
//! Catalog id formats differ between API versions (`BLAW-1000-001`,
//! `ABC-123-45-001`, bare numeric ids, or a section id equal to the course id),
//! so candidates are derived by layered patterns and the first one that exists
//! as a course wins.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex_lite::Regex;

static TRAILING_NUMERIC_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-\d+$").expect("static pattern"));

/// Candidate course ids for a section id, most specific first.
///
/// Pure string work: the section id itself, then the id with a trailing
/// `-<digits>` segment stripped, then the first two hyphen segments. The
/// section id is always present, so the result is never empty.
pub fn derive_candidate_course_ids(section_id: &str) -> Vec<String> {
    let mut candidates = vec![section_id.to_string()];

    if let Some(prefix) = TRAILING_NUMERIC_SUFFIX
        .captures(section_id)
        .and_then(|caps| caps.get(1))
    {
        candidates.push(prefix.as_str().to_string());
    }

    let parts: Vec<&str> = section_id.split('-').collect();
    if parts.len() >= 2 {
        candidates.push(format!("{}-{}", parts[0], parts[1]));
    }

    candidates
}

/// In-memory view of `course_id -> row id` used to place offerings.
#[derive(Debug, Clone, Default)]
pub struct CourseIndex {
    by_course_id: HashMap<String, i64>,
}

/// A section id resolved to its parent course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParent {
    pub course_id: String,
    pub id: i64,
}

impl CourseIndex {
    pub fn new(by_course_id: HashMap<String, i64>) -> Self {
        Self { by_course_id }
    }

    pub fn get(&self, course_id: &str) -> Option<i64> {
        self.by_course_id.get(course_id).copied()
    }

    /// First candidate of `section_id` that names a known course.
    pub fn resolve_parent(&self, section_id: &str) -> Option<ResolvedParent> {
        derive_candidate_course_ids(section_id)
            .into_iter()
            .find_map(|candidate| {
                self.get(&candidate).map(|id| ResolvedParent {
                    course_id: candidate,
                    id,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_section_id() {
        assert_eq!(
            derive_candidate_course_ids("BLAW-1000-001"),
            vec!["BLAW-1000-001", "BLAW-1000", "BLAW-1000"]
        );
    }

    #[test]
    fn test_long_section_id() {
        assert_eq!(
            derive_candidate_course_ids("ABC-123-45-001"),
            vec!["ABC-123-45-001", "ABC-123-45", "ABC-123"]
        );
    }

    #[test]
    fn test_bare_numeric_id_only_yields_itself() {
        assert_eq!(derive_candidate_course_ids("101975"), vec!["101975"]);
    }

    #[test]
    fn test_non_numeric_suffix_is_not_stripped() {
        assert_eq!(
            derive_candidate_course_ids("BLAW-1000-A"),
            vec!["BLAW-1000-A", "BLAW-1000"]
        );
    }

    #[test]
    fn test_resolution_prefers_exact_match() {
        let index = CourseIndex::new(HashMap::from([
            ("BLAW-1000".to_string(), 1),
            ("BLAW-1000-001".to_string(), 2),
        ]));

        let parent = index.resolve_parent("BLAW-1000-001").unwrap();
        assert_eq!(parent, ResolvedParent { course_id: "BLAW-1000-001".into(), id: 2 });
    }

    #[test]
    fn test_resolution_falls_through_layers() {
        let index = CourseIndex::new(HashMap::from([
            ("BLAW-1000".to_string(), 1),
            ("ABC-123".to_string(), 7),
        ]));

        assert_eq!(index.resolve_parent("BLAW-1000-001").map(|p| p.id), Some(1));
        assert_eq!(index.resolve_parent("ABC-123-45-001").map(|p| p.id), Some(7));
        assert_eq!(index.resolve_parent("ZZZ-9-001"), None);
        assert_eq!(index.resolve_parent("101975"), None);
    }
}

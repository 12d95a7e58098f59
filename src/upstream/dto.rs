use serde::{Deserialize, Deserializer, Serialize};

/// Name of the top-level field holding the record array.
pub const ENVELOPE_FIELD: &str = "array";

/// Section ids the catalog uses as "no section" placeholders.
pub const SECTION_ID_SENTINEL: &str = "-1";

/// A catalog course. Sections are read one at a time, so a malformed section
/// lands in `rejected_sections` instead of failing the whole course.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCourseRecord")]
pub struct CourseRecord {
    #[serde(rename = "Course_ID")]
    pub course_id: Option<String>,
    #[serde(rename = "Course_Desc")]
    pub description: Option<String>,
    #[serde(rename = "Course_ChangeTimestamp")]
    pub change_timestamp: Option<String>,
    #[serde(rename = "CourseSections")]
    pub sections: Vec<SectionRecord>,
    #[serde(skip)]
    pub rejected_sections: Vec<String>,
}

#[derive(Deserialize)]
struct RawCourseRecord {
    #[serde(rename = "Course_ID", default, deserialize_with = "scalar_string")]
    course_id: Option<String>,
    #[serde(rename = "Course_Desc", default, deserialize_with = "scalar_string")]
    description: Option<String>,
    #[serde(rename = "Course_ChangeTimestamp", default, deserialize_with = "scalar_string")]
    change_timestamp: Option<String>,
    #[serde(rename = "CourseSections", default, deserialize_with = "one_or_many")]
    sections: Vec<serde_json::Value>,
}

impl From<RawCourseRecord> for CourseRecord {
    fn from(raw: RawCourseRecord) -> Self {
        let mut sections = Vec::with_capacity(raw.sections.len());
        let mut rejected_sections = Vec::new();

        for (index, value) in raw.sections.into_iter().enumerate() {
            let label = section_label(&value, index);
            match serde_json::from_value::<SectionRecord>(value) {
                Ok(section) => sections.push(section),
                Err(e) => rejected_sections.push(format!("{}: {}", label, e)),
            }
        }

        Self {
            course_id: raw.course_id,
            description: raw.description,
            change_timestamp: raw.change_timestamp,
            sections,
            rejected_sections,
        }
    }
}

fn section_label(value: &serde_json::Value, index: usize) -> String {
    match value.get("CourseSec_ID") {
        Some(serde_json::Value::String(id)) => format!("section {}", id),
        Some(serde_json::Value::Number(id)) => format!("section {}", id),
        _ => format!("section #{}", index),
    }
}

/// `Course_ID` of an envelope entry that could not be read as a course, if it is
/// still a plain string or number.
pub fn readable_course_id(entry: &serde_json::Value) -> Option<String> {
    let id = match entry.get("Course_ID")? {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    #[serde(rename = "CourseSec_ID", default, deserialize_with = "scalar_string")]
    pub section_id: Option<String>,
    #[serde(rename = "CourseSec_Name", default, deserialize_with = "scalar_string")]
    pub name: Option<String>,
    #[serde(rename = "CourseSec_Term", default, deserialize_with = "scalar_string")]
    pub term: Option<String>,
    #[serde(rename = "CourseSec_Location", default, deserialize_with = "scalar_string")]
    pub location: Option<String>,
    #[serde(rename = "CourseSec_Title", default, deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(rename = "CourseSec_Instructors", default, deserialize_with = "scalar_string")]
    pub instructors: Option<String>,
    #[serde(rename = "CourseSec_StartDate", default, deserialize_with = "scalar_string")]
    pub start_date: Option<String>,
    #[serde(rename = "CourseSec_EndDate", default, deserialize_with = "scalar_string")]
    pub end_date: Option<String>,
    #[serde(rename = "CourseSectionMeetings", default, deserialize_with = "one_or_many")]
    pub meetings: Vec<MeetingRecord>,
    #[serde(rename = "CourseSecPrice_DomPrice", default, deserialize_with = "scalar_string")]
    pub domestic_price: Option<String>,
    #[serde(rename = "CourseSecPrice_DomFee", default, deserialize_with = "scalar_string")]
    pub domestic_fee: Option<String>,
    #[serde(rename = "CourseSecPrice_DomFee_Other", default, deserialize_with = "scalar_string")]
    pub domestic_fee_other: Option<String>,
    #[serde(rename = "CourseSecPrice_IntPrice", default, deserialize_with = "scalar_string")]
    pub international_price: Option<String>,
    #[serde(rename = "CourseSecPrice_IntFee", default, deserialize_with = "scalar_string")]
    pub international_fee: Option<String>,
    #[serde(rename = "CourseSecPrice_IntFee_Other", default, deserialize_with = "scalar_string")]
    pub international_fee_other: Option<String>,
    #[serde(rename = "CourseSec_OverCapacity_Flag", default, deserialize_with = "scalar_string")]
    pub over_capacity_flag: Option<String>,
    #[serde(rename = "CourseSec_Credit_Type", default, deserialize_with = "scalar_string")]
    pub credit_type: Option<String>,
    #[serde(rename = "CourseSec_Credit_Type_Message", default, deserialize_with = "scalar_string")]
    pub credit_type_message: Option<String>,
    #[serde(rename = "CourseSec_Type", default, deserialize_with = "scalar_string")]
    pub section_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingRecord {
    #[serde(rename = "CourseSecMeeting_DaysTimes", default, deserialize_with = "scalar_string")]
    pub days_times: Option<String>,
}

impl SectionRecord {
    /// The section id, unless it is missing, blank or the `-1` placeholder.
    pub fn usable_section_id(&self) -> Option<&str> {
        self.section_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && *id != SECTION_ID_SENTINEL)
    }

    /// Schedule text of the first meeting entry only.
    pub fn meeting_times(&self) -> Option<String> {
        self.meetings
            .first()
            .and_then(|m| m.days_times.clone())
            .filter(|t| !t.trim().is_empty())
    }
}

/// Accepts a JSON string, number or boolean as text; null becomes `None`.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a scalar value, got {}",
                other
            )));
        }
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Older catalog versions send a single object where newer ones send a list.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
    })
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DESCRIPTION_FORMAT: &str = "full_html";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i64,
    pub course_id: String,
    pub description: Option<String>,
    pub description_format: String,
    pub change_timestamp: Option<String>,
    pub published: bool,
    pub archived: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Mutable scalar fields of a course as delivered by the catalog.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CourseFields {
    pub course_id: String,
    pub description: Option<String>,
    pub description_format: String,
    pub change_timestamp: Option<String>,
}

impl Course {
    pub fn fields(&self) -> CourseFields {
        CourseFields {
            course_id: self.course_id.clone(),
            description: self.description.clone(),
            description_format: self.description_format.clone(),
            change_timestamp: self.change_timestamp.clone(),
        }
    }
}

pub mod dto;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;

pub use dto::{CourseRecord, MeetingRecord, SectionRecord};

const TOKEN_HEADER: &str = "api-token";
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_BODY_LIMIT: usize = 500;

/// The result of one successful catalog fetch.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub courses: Vec<CourseRecord>,
    /// Envelope entries that were not course objects, with the reason.
    pub rejected: Vec<String>,
    /// `Course_ID`s still readable on rejected entries.
    pub rejected_course_ids: Vec<String>,
}

impl CatalogSnapshot {
    /// True when some rejected entry could not be tied to a course id.
    pub fn has_unidentified_rejections(&self) -> bool {
        self.rejected.len() > self.rejected_course_ids.len()
    }
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Cheap reachability check run before a full fetch.
    async fn probe(&self) -> Result<(), SyncError>;
    async fn fetch_courses(&self) -> Result<CatalogSnapshot, SyncError>;
    async fn fetch_availability(&self, course_id: &str) -> Result<serde_json::Value, SyncError>;
}

pub struct CatalogHttpClient {
    client: Client,
    config: SyncConfig,
}

impl CatalogHttpClient {
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, SyncError> {
        if self.config.verbose {
            info!("Fetching {}", url);
        } else {
            debug!("Fetching {}", url);
        }

        let response = self.client
            .get(url)
            .header("Accept", "application/json")
            .header(TOKEN_HEADER, &self.config.api_token)
            .send()
            .await
            .map_err(|e| {
                error!("Catalog request to {} failed: {}", url, e);
                SyncError::Network { status: None, message: e.to_string() }
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            error!("Catalog API error {} from {}: {}", status, url, snippet);
            return Err(status_error(status, snippet));
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| SyncError::Network { status: Some(status.as_u16()), message: e.to_string() })?;

        serde_json::from_str::<serde_json::Value>(&body_text)
            .map_err(|e| SyncError::Schema(format!("Invalid JSON response: {}", e)))
    }
}

fn status_error(status: StatusCode, body: String) -> SyncError {
    let message = if body.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Auth {
            status: status.as_u16(),
            message,
        },
        _ => SyncError::Network {
            status: Some(status.as_u16()),
            message,
        },
    }
}

/// Pulls the record array out of the envelope.
///
/// A missing or non-array field is a schema failure, never "zero courses".
pub fn envelope_items(body: serde_json::Value) -> Result<Vec<serde_json::Value>, SyncError> {
    match body {
        serde_json::Value::Object(mut map) => match map.remove(dto::ENVELOPE_FIELD) {
            Some(serde_json::Value::Array(items)) => Ok(items),
            Some(_) => Err(SyncError::Schema(format!(
                "field \"{}\" is not an array",
                dto::ENVELOPE_FIELD
            ))),
            None => {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                Err(SyncError::Schema(format!(
                    "response missing \"{}\" field (keys: {})",
                    dto::ENVELOPE_FIELD,
                    keys.join(", ")
                )))
            }
        },
        _ => Err(SyncError::Schema("response is not a JSON object".to_string())),
    }
}

/// Parses a course envelope, rejecting malformed entries one by one.
pub fn parse_catalog(body: serde_json::Value) -> Result<CatalogSnapshot, SyncError> {
    let items = envelope_items(body)?;
    let mut snapshot = CatalogSnapshot::default();

    for (index, item) in items.into_iter().enumerate() {
        match CourseRecord::deserialize(&item) {
            Ok(course) => snapshot.courses.push(course),
            Err(e) => {
                let course_id = dto::readable_course_id(&item);
                warn!("Rejected catalog entry #{} ({:?}): {}", index, course_id, e);
                snapshot.rejected.push(format!("entry #{}: {}", index, e));
                snapshot.rejected_course_ids.extend(course_id);
            }
        }
    }

    Ok(snapshot)
}

#[async_trait]
impl CatalogClient for CatalogHttpClient {
    async fn probe(&self) -> Result<(), SyncError> {
        let url = self.config.courses_url();
        let response = self.client
            .head(&url)
            .header("Accept", "application/json")
            .header(TOKEN_HEADER, &self.config.api_token)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                error!("Catalog connectivity test failed: {}", e);
                SyncError::Network { status: None, message: format!("connectivity test failed: {}", e) }
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            error!("Catalog connectivity test returned HTTP {}", status);
            return Err(status_error(status, String::new()));
        }

        debug!("Catalog connectivity test successful");
        Ok(())
    }

    async fn fetch_courses(&self) -> Result<CatalogSnapshot, SyncError> {
        let url = self.config.courses_url();
        let body = self.get_json(&url).await?;
        let snapshot = parse_catalog(body).inspect_err(|e| error!("Catalog fetch rejected: {}", e))?;

        if self.config.verbose {
            info!("Catalog returned {} courses", snapshot.courses.len());
        }
        Ok(snapshot)
    }

    async fn fetch_availability(&self, course_id: &str) -> Result<serde_json::Value, SyncError> {
        let course_id = course_id.trim();
        if course_id.is_empty() || course_id.contains(['/', '?', '#']) {
            return Err(SyncError::record(course_id, "invalid course id"));
        }

        let url = self.config.availability_url(course_id);
        let body = self.get_json(&url).await?;

        match body.get(dto::ENVELOPE_FIELD) {
            Some(serde_json::Value::Array(_)) => Ok(body),
            _ => {
                warn!("Unexpected availability response structure for course {}", course_id);
                Err(SyncError::Schema(format!(
                    "availability response for {} missing \"{}\" array",
                    course_id,
                    dto::ENVELOPE_FIELD
                )))
            }
        }
    }
}

/// Serves a fixed catalog from memory.
pub struct StaticCatalogClient {
    courses: Vec<CourseRecord>,
}

impl StaticCatalogClient {
    pub fn new(courses: Vec<CourseRecord>) -> Self {
        Self { courses }
    }
}

#[async_trait]
impl CatalogClient for StaticCatalogClient {
    async fn probe(&self) -> Result<(), SyncError> {
        Ok(())
    }

    async fn fetch_courses(&self) -> Result<CatalogSnapshot, SyncError> {
        Ok(CatalogSnapshot {
            courses: self.courses.clone(),
            ..Default::default()
        })
    }

    async fn fetch_availability(&self, course_id: &str) -> Result<serde_json::Value, SyncError> {
        let sections: Vec<serde_json::Value> = self.courses
            .iter()
            .filter(|c| c.course_id.as_deref() == Some(course_id))
            .flat_map(|c| c.sections.iter())
            .filter_map(|s| s.usable_section_id())
            .map(|id| serde_json::json!({ "CourseSec_ID": id }))
            .collect();
        Ok(serde_json::json!({ "array": sections }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_envelope_is_schema_error() {
        let err = parse_catalog(json!({ "courses": [] })).unwrap_err();
        assert!(matches!(err, SyncError::Schema(msg) if msg.contains("courses")));
    }

    #[test]
    fn test_non_array_envelope_is_schema_error() {
        assert!(matches!(parse_catalog(json!({ "array": {} })), Err(SyncError::Schema(_))));
        assert!(matches!(parse_catalog(json!([1, 2])), Err(SyncError::Schema(_))));
    }

    #[test]
    fn test_empty_envelope_is_not_an_error() {
        let snapshot = parse_catalog(json!({ "array": [] })).unwrap();
        assert!(snapshot.courses.is_empty());
        assert!(snapshot.rejected.is_empty());
    }

    #[test]
    fn test_malformed_entries_are_rejected_individually() {
        let snapshot = parse_catalog(json!({
            "array": [
                { "Course_ID": "X-1" },
                "not a course",
                { "Course_ID": "X-2", "CourseSections": [{ "CourseSec_ID": { "nested": true } }] },
                { "Course_ID": "X-3", "Course_Desc": ["not", "text"] }
            ]
        }))
        .unwrap();

        assert_eq!(snapshot.courses.len(), 2);
        assert_eq!(snapshot.courses[0].course_id.as_deref(), Some("X-1"));
        assert_eq!(snapshot.courses[1].course_id.as_deref(), Some("X-2"));
        assert_eq!(snapshot.courses[1].rejected_sections.len(), 1);
        assert_eq!(snapshot.rejected.len(), 2);
        assert_eq!(snapshot.rejected_course_ids, vec!["X-3".to_string()]);
        assert!(snapshot.has_unidentified_rejections());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new()),
            SyncError::Auth { status: 401, .. }
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "down".into()),
            SyncError::Network { status: Some(502), .. }
        ));
    }
}

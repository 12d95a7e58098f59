#![allow(dead_code)]

use async_trait::async_trait;
use course_sync::error::SyncError;
use course_sync::upstream::{CatalogClient, CatalogSnapshot, CourseRecord, parse_catalog};
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

pub async fn setup_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub fn course(value: Value) -> CourseRecord {
    serde_json::from_value(value).expect("valid course record")
}

/// Serves a raw envelope, parsed exactly as the HTTP client would.
pub struct EnvelopeCatalog {
    pub body: Value,
}

#[async_trait]
impl CatalogClient for EnvelopeCatalog {
    async fn probe(&self) -> Result<(), SyncError> {
        Ok(())
    }

    async fn fetch_courses(&self) -> Result<CatalogSnapshot, SyncError> {
        parse_catalog(self.body.clone())
    }

    async fn fetch_availability(&self, _course_id: &str) -> Result<Value, SyncError> {
        Ok(serde_json::json!({ "array": [] }))
    }
}

/// A catalog that cannot be reached.
pub struct UnreachableCatalog;

#[async_trait]
impl CatalogClient for UnreachableCatalog {
    async fn probe(&self) -> Result<(), SyncError> {
        Err(SyncError::Network { status: None, message: "connection refused".to_string() })
    }

    async fn fetch_courses(&self) -> Result<CatalogSnapshot, SyncError> {
        Err(SyncError::Network { status: Some(503), message: "unavailable".to_string() })
    }

    async fn fetch_availability(&self, _course_id: &str) -> Result<Value, SyncError> {
        Err(SyncError::Network { status: Some(503), message: "unavailable".to_string() })
    }
}

use axum::Json;
use axum::extract::Path;
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use tokio::sync::MutexGuard;

use crate::db::repository;
use crate::error::AppError;
use crate::models::*;
use crate::services::{OrphanReport, RunReport, RunStatus, SyncService, repair_orphans};
use crate::state::AppState;

const RECENT_RUNS: i64 = 50;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/courses", get(list_courses))
        .route("/courses/{course_id}/offerings", get(list_offerings))
        .route("/courses/{course_id}/availability", get(availability))
        .route("/sync", post(sync_now))
        .route("/sync/orphans", post(attach_orphans))
        .route("/runs", get(list_runs))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn status(State(state): State<AppState>) -> Result<Json<SyncOverview>, AppError> {
    let overview = repository::fetch_overview(&state.db).await?;
    Ok(Json(overview))
}

async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, AppError> {
    let courses = repository::fetch_courses(&state.db).await?;
    Ok(Json(courses))
}

async fn list_offerings(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<Vec<Offering>>, AppError> {
    let course = repository::find_course_by_course_id(&state.db, &course_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let offerings = repository::fetch_course_offerings(&state.db, course.id).await?;
    Ok(Json(offerings))
}

async fn availability(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body = state.catalog.fetch_availability(&course_id).await?;
    Ok(Json(body))
}

fn writer_lock(state: &AppState) -> Result<MutexGuard<'_, ()>, AppError> {
    state
        .run_lock
        .try_lock()
        .map_err(|_| AppError::Conflict("a sync run is already in progress".to_string()))
}

async fn sync_now(State(state): State<AppState>) -> Result<(StatusCode, Json<RunReport>), AppError> {
    let _guard = writer_lock(&state)?;
    let service = SyncService::new(state.db.clone(), state.catalog.clone(), state.options.clone());
    let report = service.refresh().await;

    let code = if report.status == RunStatus::Failed {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    Ok((code, Json(report)))
}

async fn attach_orphans(State(state): State<AppState>) -> Result<Json<OrphanReport>, AppError> {
    let _guard = writer_lock(&state)?;
    let report = repair_orphans(&state.db).await;
    Ok(Json(report))
}

async fn list_runs(State(state): State<AppState>) -> Result<Json<Vec<SyncRun>>, AppError> {
    let runs = repository::fetch_sync_runs(&state.db, RECENT_RUNS).await?;
    Ok(Json(runs))
}

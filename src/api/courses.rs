//! Read-only REST API over subjects and courses, plus enrollment
//!
//! - GET /api/subjects/ , /api/subjects/{id}/
//! - GET /api/courses/ , /api/courses/{id}/
//! - POST /api/courses/{id}/enroll/ (authenticated)

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CourseDetail, Subject};

/// Response of the enroll endpoint
#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub enrolled: bool,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/subjects/", get(list_subjects))
        .route("/subjects/{id}/", get(get_subject))
        .route("/courses/", get(list_courses))
        .route("/courses/{id}/", get(get_course))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/courses/{id}/enroll/", post(enroll))
}

async fn list_subjects(State(state): State<AppState>) -> Result<Json<Vec<Subject>>, ApiError> {
    Ok(Json(state.catalog_service.list_subjects().await?))
}

async fn get_subject(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Subject>, ApiError> {
    Ok(Json(state.catalog_service.get_subject(id).await?))
}

async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<CourseDetail>>, ApiError> {
    Ok(Json(state.catalog_service.list_courses().await?))
}

async fn get_course(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<CourseDetail>, ApiError> {
    Ok(Json(state.catalog_service.course_detail(id).await?))
}

/// POST /api/courses/{id}/enroll/
async fn enroll(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<EnrollResponse>, ApiError> {
    state.enrollment_service.enroll(&user.0, id).await?;
    Ok(Json(EnrollResponse { enrolled: true }))
}

//! Public catalog endpoints
//!
//! - GET /api/catalog/ - All subjects and courses
//! - GET /api/catalog/subject/{slug}/ - Courses of one subject
//! - GET /api/catalog/courses/{slug}/ - Course detail with modules

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CatalogListing, CourseDetail};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/catalog/", get(listing))
        .route("/catalog/subject/{slug}/", get(subject_listing))
        .route("/catalog/courses/{slug}/", get(course_detail))
}

async fn listing(State(state): State<AppState>) -> Result<Json<CatalogListing>, ApiError> {
    Ok(Json(state.catalog_service.listing(None).await?))
}

async fn subject_listing(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CatalogListing>, ApiError> {
    Ok(Json(state.catalog_service.listing(Some(&slug)).await?))
}

async fn course_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CourseDetail>, ApiError> {
    Ok(Json(state.catalog_service.course_detail_by_slug(&slug).await?))
}

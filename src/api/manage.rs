//! Instructor authoring endpoints
//!
//! Everything here sits behind `require_auth` and `require_instructor` and is
//! scoped to the requesting user's own courses. A course, module, content or
//! item of another user answers 404 like a missing one.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Course, CourseForm, Item, ItemForm, ItemKind, Module, ModuleFormSet, OrderMap};
use crate::services::{ContentFormView, ContentServiceError, CourseEditForm, ModuleContents, ModuleFormView};

/// Response of the reorder endpoints
#[derive(Debug, Serialize)]
pub struct SavedResponse {
    pub saved: &'static str,
}

/// Response of content deletion
#[derive(Debug, Serialize)]
pub struct ContentDeleted {
    pub module: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/manage/courses/", get(list_courses).post(create_course))
        .route(
            "/manage/courses/{id}/",
            get(course_form).put(update_course).delete(delete_course),
        )
        .route("/manage/courses/new/", get(new_course_form))
        .route("/manage/courses/{id}/modules/", get(module_formset).put(save_module_formset))
        .route("/manage/modules/order/", post(reorder_modules))
        .route("/manage/modules/{module_id}/", get(module_contents))
        .route(
            "/manage/modules/{module_id}/content/{kind}/",
            get(new_content_form).post(create_content),
        )
        .route(
            "/manage/modules/{module_id}/content/{kind}/{id}/",
            get(content_form).put(update_content),
        )
        .route("/manage/contents/order/", post(reorder_contents))
        .route("/manage/contents/{id}/", delete(delete_content))
}

fn parse_kind(tag: &str) -> Result<ItemKind, ApiError> {
    ItemKind::from_tag(tag).ok_or_else(|| ApiError::not_found(format!("Unknown content type: {}", tag)))
}

/// Like the plain conversion, but a rejected item form carries the schema of `kind`
fn content_error(err: ContentServiceError, kind: ItemKind) -> ApiError {
    match err {
        ContentServiceError::Validation(errors) => ApiError::invalid_form(errors, kind.form_schema()),
        other => other.into(),
    }
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

async fn list_courses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(state.course_service.list_owned(&user.0).await?))
}

async fn new_course_form(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<CourseEditForm>, ApiError> {
    Ok(Json(state.course_service.edit_form(&user.0, None).await?))
}

async fn course_form(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<CourseEditForm>, ApiError> {
    Ok(Json(state.course_service.edit_form(&user.0, Some(id)).await?))
}

async fn create_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(form): Json<CourseForm>,
) -> Result<impl IntoResponse, ApiError> {
    let course = state.course_service.create(&user.0, form).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(form): Json<CourseForm>,
) -> Result<Json<Course>, ApiError> {
    Ok(Json(state.course_service.update(&user.0, id, form).await?))
}

async fn delete_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.course_service.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

async fn module_formset(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ModuleFormView>, ApiError> {
    Ok(Json(state.module_service.formset(&user.0, id).await?))
}

async fn save_module_formset(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(formset): Json<ModuleFormSet>,
) -> Result<Json<Vec<Module>>, ApiError> {
    Ok(Json(state.module_service.save_formset(&user.0, id, formset).await?))
}

async fn module_contents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(module_id): Path<i64>,
) -> Result<Json<ModuleContents>, ApiError> {
    Ok(Json(state.content_service.module_contents(&user.0, module_id).await?))
}

// ---------------------------------------------------------------------------
// Contents
// ---------------------------------------------------------------------------

async fn new_content_form(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((module_id, tag)): Path<(i64, String)>,
) -> Result<Json<ContentFormView>, ApiError> {
    let kind = parse_kind(&tag)?;
    state
        .content_service
        .get_content_form(&user.0, module_id, kind, None)
        .await
        .map(Json)
        .map_err(|e| content_error(e, kind))
}

async fn content_form(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((module_id, tag, id)): Path<(i64, String, i64)>,
) -> Result<Json<ContentFormView>, ApiError> {
    let kind = parse_kind(&tag)?;
    state
        .content_service
        .get_content_form(&user.0, module_id, kind, Some(id))
        .await
        .map(Json)
        .map_err(|e| content_error(e, kind))
}

async fn create_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((module_id, tag)): Path<(i64, String)>,
    Json(form): Json<ItemForm>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&tag)?;
    let item = state
        .content_service
        .save_content(&user.0, module_id, kind, None, form)
        .await
        .map_err(|e| content_error(e, kind))?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((module_id, tag, id)): Path<(i64, String, i64)>,
    Json(form): Json<ItemForm>,
) -> Result<Json<Item>, ApiError> {
    let kind = parse_kind(&tag)?;
    state
        .content_service
        .save_content(&user.0, module_id, kind, Some(id), form)
        .await
        .map(Json)
        .map_err(|e| content_error(e, kind))
}

async fn delete_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ContentDeleted>, ApiError> {
    let module = state.content_service.delete_content(&user.0, id).await?;
    Ok(Json(ContentDeleted { module }))
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

async fn reorder_modules(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(order): Json<OrderMap>,
) -> Result<Json<SavedResponse>, ApiError> {
    state.reorder_service.reorder_modules(&user.0, &order).await?;
    Ok(Json(SavedResponse { saved: "ok" }))
}

async fn reorder_contents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(order): Json<OrderMap>,
) -> Result<Json<SavedResponse>, ApiError> {
    state.reorder_service.reorder_contents(&user.0, &order).await?;
    Ok(Json(SavedResponse { saved: "ok" }))
}

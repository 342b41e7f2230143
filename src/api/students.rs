//! Student endpoints
//!
//! - POST /api/students/register/ - Create a student account and log it in
//! - POST /api/students/enroll/ - Form-encoded `course=<id>`, redirects to the course.
//!   A missing or unknown course is a form error on `course`.
//! - GET /api/students/courses/ - Courses the user is enrolled in
//! - GET /api/students/courses/{id}/ and .../modules/{module_id}/ - Course content

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;

use crate::api::auth::{logged_in, RegisterRequest};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Course, CreateUserInput, FieldKind, FormErrors, FormField, FormSchema, UserRole};
use crate::services::{EnrollmentError, StudentCourseView};

/// Enrollment form posted from a course page
#[derive(Debug, Default, Deserialize)]
pub struct EnrollForm {
    #[serde(default)]
    pub course: String,
}

impl EnrollForm {
    pub fn schema() -> FormSchema {
        FormSchema::new(vec![FormField::required("course", FieldKind::Select)])
    }

    fn invalid(message: &str) -> ApiError {
        let mut errors = FormErrors::new();
        errors.add("course", message);
        ApiError::invalid_form(errors, Self::schema())
    }
}

const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

pub fn public_router() -> Router<AppState> {
    Router::new().route("/students/register/", post(register))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/students/enroll/", post(enroll))
        .route("/students/courses/", get(list_courses))
        .route("/students/courses/{id}/", get(course_detail))
        .route("/students/courses/{id}/modules/{module_id}/", get(course_module))
}

/// Location of an enrolled course's student view
pub fn course_location(course_id: i64) -> String {
    format!("/api/students/courses/{}/", course_id)
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = CreateUserInput {
        role: Some(UserRole::Student),
        ..CreateUserInput::new(body.username, body.email, body.password)
    };
    let user = state.user_service.register(input).await?;
    let session = state.user_service.start_session(user.id).await?;
    logged_in(StatusCode::CREATED, user, session)
}

async fn enroll(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Form(form): Form<EnrollForm>,
) -> Result<Redirect, ApiError> {
    let value = form.course.trim();
    if value.is_empty() {
        return Err(EnrollForm::invalid("This field is required."));
    }
    let course_id: i64 = value.parse().map_err(|_| EnrollForm::invalid(INVALID_CHOICE))?;

    match state.enrollment_service.enroll(&user.0, course_id).await {
        Ok(course) => Ok(Redirect::to(&course_location(course.id))),
        Err(EnrollmentError::NotFound) => Err(EnrollForm::invalid(INVALID_CHOICE)),
        Err(e) => Err(e.into()),
    }
}

async fn list_courses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(state.enrollment_service.enrolled_courses(&user.0).await?))
}

async fn course_detail(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<StudentCourseView>, ApiError> {
    Ok(Json(state.enrollment_service.enrolled_course(&user.0, id, None).await?))
}

async fn course_module(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, module_id)): Path<(i64, i64)>,
) -> Result<Json<StudentCourseView>, ApiError> {
    Ok(Json(
        state
            .enrollment_service
            .enrolled_course(&user.0, id, Some(module_id))
            .await?,
    ))
}

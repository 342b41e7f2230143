//! API middleware
//!
//! Contains:
//! - Application state shared by all handlers
//! - The JSON error envelope and its mapping from service errors
//! - Authentication (session token or HTTP Basic credentials)
//! - Role checks for instructor and admin routes

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{Config, UploadConfig};
use crate::db::repositories::{
    SqlxContentRepository, SqlxCourseRepository, SqlxEnrollmentRepository, SqlxItemRepository,
    SqlxModuleRepository, SqlxSessionRepository, SqlxSubjectRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{CourseForm, FormErrors, FormSchema, ModuleFormRow, SubjectForm, User};
use crate::services::{
    CatalogError, CatalogService, ContentService, ContentServiceError, CourseService, CourseServiceError,
    EnrollmentError, EnrollmentService, ModuleService, ModuleServiceError, ReorderService, UserService,
    UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub catalog_service: Arc<CatalogService>,
    pub course_service: Arc<CourseService>,
    pub module_service: Arc<ModuleService>,
    pub content_service: Arc<ContentService>,
    pub enrollment_service: Arc<EnrollmentService>,
    pub reorder_service: Arc<ReorderService>,
    pub upload_config: Arc<UploadConfig>,
}

impl AppState {
    /// Wire repositories and services over a migrated pool
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let subject_repo = SqlxSubjectRepository::boxed(pool.clone());
        let course_repo = SqlxCourseRepository::boxed(pool.clone());
        let module_repo = SqlxModuleRepository::boxed(pool.clone());
        let content_repo = SqlxContentRepository::boxed(pool.clone());
        let item_repo = SqlxItemRepository::boxed(pool.clone());
        let enrollment_repo = SqlxEnrollmentRepository::boxed(pool.clone());

        let content_service = Arc::new(ContentService::new(
            module_repo.clone(),
            content_repo.clone(),
            item_repo,
            config.upload.url_prefix.clone(),
        ));

        Self {
            user_service: Arc::new(UserService::with_session_expiration(
                user_repo,
                session_repo,
                config.session.ttl_days,
            )),
            catalog_service: Arc::new(CatalogService::new(
                subject_repo.clone(),
                course_repo.clone(),
                module_repo.clone(),
                enrollment_repo.clone(),
            )),
            course_service: Arc::new(CourseService::new(course_repo.clone(), subject_repo)),
            module_service: Arc::new(ModuleService::new(course_repo.clone(), module_repo.clone())),
            enrollment_service: Arc::new(EnrollmentService::new(
                course_repo,
                module_repo.clone(),
                enrollment_repo,
                content_service.clone(),
            )),
            reorder_service: Arc::new(ReorderService::new(module_repo, content_repo)),
            content_service,
            upload_config: Arc::new(config.upload.clone()),
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(code: impl Into<String>, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// Rejected form submission: field errors plus the form they belong to
    pub fn invalid_form(errors: FormErrors, schema: FormSchema) -> Self {
        Self::with_details(
            "VALIDATION_ERROR",
            "Please correct the errors below.",
            serde_json::json!({ "errors": errors, "form": schema }),
        )
    }

    /// Log the cause and hide it from the client
    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = ?err, "Request failed");
        Self::internal_error("Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<CourseServiceError> for ApiError {
    fn from(err: CourseServiceError) -> Self {
        match err {
            CourseServiceError::NotFound => ApiError::not_found("Course not found"),
            CourseServiceError::Validation(errors) => ApiError::invalid_form(errors, CourseForm::schema()),
            CourseServiceError::Internal(e) => ApiError::internal(e),
        }
    }
}

impl From<ModuleServiceError> for ApiError {
    fn from(err: ModuleServiceError) -> Self {
        match err {
            ModuleServiceError::NotFound => ApiError::not_found("Course not found"),
            ModuleServiceError::Validation(errors) => ApiError::invalid_form(errors, ModuleFormRow::schema()),
            ModuleServiceError::Internal(e) => ApiError::internal(e),
        }
    }
}

impl From<ContentServiceError> for ApiError {
    fn from(err: ContentServiceError) -> Self {
        match err {
            ContentServiceError::NotFound => ApiError::not_found("Not found"),
            ContentServiceError::Validation(errors) => ApiError::with_details(
                "VALIDATION_ERROR",
                "Please correct the errors below.",
                serde_json::json!({ "errors": errors }),
            ),
            ContentServiceError::Internal(e) => ApiError::internal(e),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound => ApiError::not_found("Not found"),
            CatalogError::Validation(errors) => ApiError::invalid_form(errors, SubjectForm::schema()),
            CatalogError::Internal(e) => ApiError::internal(e),
        }
    }
}

impl From<EnrollmentError> for ApiError {
    fn from(err: EnrollmentError) -> Self {
        match err {
            EnrollmentError::NotFound => ApiError::not_found("Course not found"),
            EnrollmentError::Internal(e) => ApiError::internal(e),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::internal(err)
    }
}

/// Credentials presented by a request
#[derive(Debug, Clone, PartialEq, Eq)]
enum Credentials {
    /// Session token from a Bearer header or the session cookie
    Session(String),
    /// Base64 `username:password` from a Basic header
    Basic(String),
}

/// Extract credentials. The Authorization header wins over the cookie.
fn extract_credentials(headers: &HeaderMap) -> Option<Credentials> {
    if let Some(auth_str) = headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return Some(Credentials::Session(token.trim().to_string()));
        }
        if let Some(encoded) = auth_str.strip_prefix("Basic ") {
            return Some(Credentials::Basic(encoded.trim().to_string()));
        }
    }

    if let Some(cookie_str) = headers.get(header::COOKIE).and_then(|h| h.to_str().ok()) {
        for cookie in cookie_str.split(';') {
            if let Some(token) = cookie.trim().strip_prefix("session=") {
                return Some(Credentials::Session(token.to_string()));
            }
        }
    }

    None
}

/// Session token of the request, if it carries one
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    match extract_credentials(headers)? {
        Credentials::Session(token) => Some(token),
        Credentials::Basic(_) => None,
    }
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credentials = extract_credentials(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))?;

    let user = match credentials {
        Credentials::Session(token) => state.user_service.validate_session(&token).await?,
        Credentials::Basic(encoded) => state.user_service.authenticate_basic(&encoded).await?,
    }
    .ok_or_else(|| ApiError::unauthorized("Invalid or expired credentials"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Instructor authorization middleware
pub async fn require_instructor(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_instructor() {
        return Err(ApiError::forbidden("Instructor privileges required"));
    }

    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

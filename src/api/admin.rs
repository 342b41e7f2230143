//! Admin API endpoints
//!
//! - POST /api/admin/subjects/ - Create a subject
//! - PUT /api/admin/users/{id}/role - Change a user's role

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{SubjectForm, User, UserRole};

/// Request for changing a role
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/subjects/", post(create_subject))
        .route("/admin/users/{id}/role", put(set_role))
}

async fn create_subject(
    State(state): State<AppState>,
    Json(form): Json<SubjectForm>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = state.catalog_service.create_subject(form).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

async fn set_role(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<User>, ApiError> {
    if id == admin.0.id && body.role != UserRole::Admin {
        return Err(ApiError::validation_error("You cannot remove your own admin role."));
    }
    Ok(Json(state.user_service.set_role(id, body.role).await?))
}

//! API layer - HTTP handlers and routing
//!
//! JSON endpoints under `/api`:
//! - Accounts (register, login, logout, current user)
//! - Public catalog and the read-only subjects/courses API
//! - Instructor authoring of courses, modules and contents
//! - Student enrollment and course views
//! - Admin subject and role management
//!
//! Uploaded files are served from the configured upload directory.

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod courses;
pub mod manage;
pub mod middleware;
pub mod students;
pub mod upload;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = admin::router()
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Authoring routes (need instructor role)
    let manage_routes = manage::router()
        .merge(upload::router(state.upload_config.max_file_size))
        .route_layer(axum_middleware::from_fn(middleware::require_instructor))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (any authenticated user)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .merge(courses::protected_router())
        .merge(students::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(courses::public_router())
        .merge(catalog::router())
        .merge(students::public_router())
        .merge(admin_routes)
        .merge(manage_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!(origin = cors_origin, "Ignoring invalid CORS origin"),
    }

    let uploads = ServeDir::new(&state.upload_config.path);
    let uploads_prefix = state.upload_config.url_prefix.trim_end_matches('/').to_string();

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .nest_service(&uploads_prefix, uploads)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Services layer - Business logic
//!
//! Services validate input, enforce ownership and roles, and coordinate the
//! repositories. Each service has its own error enum; handlers map them to
//! HTTP responses.

pub mod catalog;
pub mod content;
pub mod course;
pub mod enrollment;
pub mod module;
pub mod password;
pub mod reorder;
pub mod user;

pub use catalog::{CatalogError, CatalogService};
pub use content::{ContentFormView, ContentService, ContentServiceError, ModuleContents};
pub use course::{CourseEditForm, CourseService, CourseServiceError};
pub use enrollment::{EnrollmentError, EnrollmentService, StudentCourseView};
pub use module::{ModuleFormView, ModuleService, ModuleServiceError};
pub use password::{hash_password, verify_password};
pub use reorder::ReorderService;
pub use user::{LoginInput, UserService, UserServiceError};

//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one entity; owner-scoped methods
//! take the requesting user's id and treat foreign rows as missing.

pub mod content;
pub mod course;
pub mod enrollment;
pub mod item;
pub mod module;
pub mod session;
pub mod subject;
pub mod user;

pub use content::{ContentRepository, SqlxContentRepository};
pub use course::{CourseRepository, SqlxCourseRepository};
pub use enrollment::{EnrollmentRepository, SqlxEnrollmentRepository};
pub use item::{ItemRepository, SqlxItemRepository};
pub use module::{ModuleRepository, SqlxModuleRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use subject::{SqlxSubjectRepository, SubjectRepository};
pub use user::{SqlxUserRepository, UserRepository};

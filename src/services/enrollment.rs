//! Enrollment service
//!
//! Students join courses and read the courses they joined.

use crate::db::repositories::{CourseRepository, EnrollmentRepository, ModuleRepository};
use crate::models::{ContentWithItem, Course, Module, User};
use crate::services::content::{ContentService, ContentServiceError};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ContentServiceError> for EnrollmentError {
    fn from(err: ContentServiceError) -> Self {
        match err {
            ContentServiceError::NotFound => EnrollmentError::NotFound,
            ContentServiceError::Validation(errors) => {
                EnrollmentError::Internal(anyhow::anyhow!("unexpected validation error: {:?}", errors))
            }
            ContentServiceError::Internal(e) => EnrollmentError::Internal(e),
        }
    }
}

/// An enrolled course opened at one module
#[derive(Debug, Clone, Serialize)]
pub struct StudentCourseView {
    pub course: Course,
    pub modules: Vec<Module>,
    /// The selected module, `None` for a course without modules
    pub module: Option<Module>,
    pub contents: Vec<ContentWithItem>,
}

pub struct EnrollmentService {
    course_repo: Arc<dyn CourseRepository>,
    module_repo: Arc<dyn ModuleRepository>,
    enrollment_repo: Arc<dyn EnrollmentRepository>,
    content_service: Arc<ContentService>,
}

impl EnrollmentService {
    pub fn new(
        course_repo: Arc<dyn CourseRepository>,
        module_repo: Arc<dyn ModuleRepository>,
        enrollment_repo: Arc<dyn EnrollmentRepository>,
        content_service: Arc<ContentService>,
    ) -> Self {
        Self {
            course_repo,
            module_repo,
            enrollment_repo,
            content_service,
        }
    }

    /// Add `user` to the course's students. Enrolling twice is a no-op.
    pub async fn enroll(&self, user: &User, course_id: i64) -> Result<Course, EnrollmentError> {
        let course = self
            .course_repo
            .get_by_id(course_id)
            .await
            .context("Failed to get course")?
            .ok_or(EnrollmentError::NotFound)?;
        self.enrollment_repo
            .add_student(course.id, user.id)
            .await
            .context("Failed to enroll student")?;
        tracing::info!(course_id = course.id, user_id = user.id, "Student enrolled");
        Ok(course)
    }

    pub async fn enrolled_courses(&self, user: &User) -> Result<Vec<Course>, EnrollmentError> {
        let courses = self
            .course_repo
            .list_enrolled(user.id)
            .await
            .context("Failed to list enrolled courses")?;
        Ok(courses)
    }

    /// An enrolled course with `module_id` (or the first module) and its contents.
    ///
    /// A course the user is not enrolled in, or a module of another course,
    /// is not found.
    pub async fn enrolled_course(
        &self,
        user: &User,
        course_id: i64,
        module_id: Option<i64>,
    ) -> Result<StudentCourseView, EnrollmentError> {
        let course = self
            .course_repo
            .get_enrolled(course_id, user.id)
            .await
            .context("Failed to get enrolled course")?
            .ok_or(EnrollmentError::NotFound)?;
        let modules = self
            .module_repo
            .list_by_course(course.id)
            .await
            .context("Failed to list modules")?;

        let module = match module_id {
            Some(id) => Some(
                modules
                    .iter()
                    .find(|m| m.id == id)
                    .cloned()
                    .ok_or(EnrollmentError::NotFound)?,
            ),
            None => modules.first().cloned(),
        };
        let contents = match &module {
            Some(module) => self.content_service.contents_with_items(module.id).await?,
            None => Vec::new(),
        };

        Ok(StudentCourseView {
            course,
            modules,
            module,
            contents,
        })
    }
}

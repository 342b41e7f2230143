//! Course service
//!
//! Instructor-side course management. Every operation is scoped to the
//! requesting user: a course owned by someone else behaves exactly like a
//! missing one.

use crate::db::repositories::{CourseRepository, SubjectRepository};
use crate::models::{Course, CourseForm, FormErrors, FormSchema, User};
use anyhow::Context;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_-]+$").expect("valid slug regex"));

/// Record a field error unless `slug` is a valid slug.
pub(crate) fn check_slug(errors: &mut FormErrors, field: &str, slug: &str) {
    if !slug.is_empty() && !SLUG_RE.is_match(slug) {
        errors.add(
            field,
            "Enter a valid slug consisting of lowercase letters, numbers, underscores or hyphens.",
        );
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CourseServiceError {
    #[error("Course not found")]
    NotFound,

    #[error("Invalid course data")]
    Validation(FormErrors),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// A course with the values and schema of its edit form
#[derive(Debug, Clone, serde::Serialize)]
pub struct CourseEditForm {
    pub course: Option<Course>,
    pub form: CourseForm,
    pub schema: FormSchema,
}

pub struct CourseService {
    course_repo: Arc<dyn CourseRepository>,
    subject_repo: Arc<dyn SubjectRepository>,
}

impl CourseService {
    pub fn new(course_repo: Arc<dyn CourseRepository>, subject_repo: Arc<dyn SubjectRepository>) -> Self {
        Self {
            course_repo,
            subject_repo,
        }
    }

    /// Courses owned by `user`, newest first
    pub async fn list_owned(&self, user: &User) -> Result<Vec<Course>, CourseServiceError> {
        let courses = self
            .course_repo
            .list_owned(user.id)
            .await
            .context("Failed to list owned courses")?;
        Ok(courses)
    }

    pub async fn get_owned(&self, user: &User, id: i64) -> Result<Course, CourseServiceError> {
        self.course_repo
            .get_owned(id, user.id)
            .await
            .context("Failed to get course")?
            .ok_or(CourseServiceError::NotFound)
    }

    /// Edit form of an owned course, or an empty form when `id` is `None`
    pub async fn edit_form(&self, user: &User, id: Option<i64>) -> Result<CourseEditForm, CourseServiceError> {
        let course = match id {
            Some(id) => Some(self.get_owned(user, id).await?),
            None => None,
        };
        Ok(CourseEditForm {
            form: course.as_ref().map(CourseForm::from_course).unwrap_or_default(),
            course,
            schema: CourseForm::schema(),
        })
    }

    pub async fn create(&self, user: &User, form: CourseForm) -> Result<Course, CourseServiceError> {
        let subject_id = self.validate(&form, None).await?;
        let course = Course {
            id: 0,
            owner_id: user.id,
            subject_id,
            title: form.title.trim().to_string(),
            slug: form.slug,
            overview: form.overview,
            created_at: Utc::now(),
        };
        let created = self
            .course_repo
            .create(&course)
            .await
            .context("Failed to create course")?;
        tracing::info!(course_id = created.id, owner_id = user.id, slug = %created.slug, "Course created");
        Ok(created)
    }

    pub async fn update(&self, user: &User, id: i64, form: CourseForm) -> Result<Course, CourseServiceError> {
        let existing = self.get_owned(user, id).await?;
        let subject_id = self.validate(&form, Some(id)).await?;
        let course = Course {
            subject_id,
            title: form.title.trim().to_string(),
            slug: form.slug,
            overview: form.overview,
            ..existing
        };
        let updated = self
            .course_repo
            .update_owned(&course)
            .await
            .context("Failed to update course")?;
        if !updated {
            return Err(CourseServiceError::NotFound);
        }
        tracing::info!(course_id = id, owner_id = user.id, "Course updated");
        Ok(course)
    }

    /// Delete an owned course with everything below it
    pub async fn delete(&self, user: &User, id: i64) -> Result<(), CourseServiceError> {
        let deleted = self
            .course_repo
            .delete_owned(id, user.id)
            .await
            .context("Failed to delete course")?;
        if !deleted {
            return Err(CourseServiceError::NotFound);
        }
        tracing::info!(course_id = id, owner_id = user.id, "Course deleted");
        Ok(())
    }

    /// Validate a submitted course form, returning the chosen subject id.
    async fn validate(&self, form: &CourseForm, course_id: Option<i64>) -> Result<i64, CourseServiceError> {
        let schema = CourseForm::schema();
        let mut errors = FormErrors::new();

        schema.check(&mut errors, "title", &form.title);
        schema.check(&mut errors, "slug", &form.slug);
        check_slug(&mut errors, "slug", &form.slug);

        if errors.get("slug").is_none()
            && self
                .course_repo
                .slug_taken(&form.slug, course_id)
                .await
                .context("Failed to check course slug")?
        {
            errors.add("slug", "Course with this slug already exists.");
        }

        let subject_id = match form.subject {
            None => {
                errors.add("subject", "This field is required.");
                0
            }
            Some(id) => {
                let subject = self
                    .subject_repo
                    .get_by_id(id)
                    .await
                    .context("Failed to get subject")?;
                if subject.is_none() {
                    errors.add(
                        "subject",
                        "Select a valid choice. That choice is not one of the available choices.",
                    );
                }
                id
            }
        };

        errors.into_result().map_err(CourseServiceError::Validation)?;
        Ok(subject_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_subject, insert_user, setup_pool};
    use crate::db::repositories::{SqlxCourseRepository, SqlxSubjectRepository};
    use crate::db::DynDatabasePool;
    use crate::models::UserRole;

    async fn setup() -> (DynDatabasePool, CourseService, i64) {
        let pool = setup_pool().await;
        let subject = insert_subject(&pool, "programming").await;
        let service = CourseService::new(
            SqlxCourseRepository::boxed(pool.clone()),
            SqlxSubjectRepository::boxed(pool.clone()),
        );
        (pool, service, subject.id)
    }

    fn form(subject: i64, slug: &str) -> CourseForm {
        CourseForm {
            subject: Some(subject),
            title: "Rust for beginners".to_string(),
            slug: slug.to_string(),
            overview: "Ownership and borrowing".to_string(),
        }
    }

    fn field_errors(err: CourseServiceError) -> FormErrors {
        match err {
            CourseServiceError::Validation(errors) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_stamps_owner() {
        let (pool, service, subject) = setup().await;
        let alice = insert_user(&pool, "alice", UserRole::Instructor).await;

        let course = service.create(&alice, form(subject, "rust-101")).await.unwrap();
        assert_eq!(course.owner_id, alice.id);
        assert_eq!(service.list_owned(&alice).await.unwrap().len(), 1);
    }

    #[test]
    fn test_check_slug() {
        let mut errors = FormErrors::new();
        check_slug(&mut errors, "slug", "rust_101-intro");
        assert!(errors.is_empty());

        for bad in ["Rust", "has space", "ünïcode", "a/b"] {
            let mut errors = FormErrors::new();
            check_slug(&mut errors, "slug", bad);
            assert!(errors.get("slug").is_some(), "{} should be rejected", bad);
        }
    }

    #[tokio::test]
    async fn test_create_validation_errors() {
        let (pool, service, subject) = setup().await;
        let alice = insert_user(&pool, "alice", UserRole::Instructor).await;

        let err = service
            .create(
                &alice,
                CourseForm {
                    subject: None,
                    title: " ".to_string(),
                    slug: "Not A Slug".to_string(),
                    overview: String::new(),
                },
            )
            .await
            .unwrap_err();
        let errors = field_errors(err);
        assert!(errors.get("subject").is_some());
        assert!(errors.get("title").is_some());
        assert!(errors.get("slug").is_some());
        assert!(errors.get("overview").is_none());

        let err = service.create(&alice, form(subject + 100, "rust")).await.unwrap_err();
        assert!(field_errors(err).get("subject").is_some());
        assert!(service.list_owned(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slug_must_be_unique() {
        let (pool, service, subject) = setup().await;
        let alice = insert_user(&pool, "alice", UserRole::Instructor).await;
        let bob = insert_user(&pool, "bob", UserRole::Instructor).await;

        let course = service.create(&alice, form(subject, "rust")).await.unwrap();
        let err = service.create(&bob, form(subject, "rust")).await.unwrap_err();
        assert!(field_errors(err).get("slug").is_some());

        // Keeping its own slug is fine.
        service.update(&alice, course.id, form(subject, "rust")).await.unwrap();
    }

    #[tokio::test]
    async fn test_foreign_course_is_not_found() {
        let (pool, service, subject) = setup().await;
        let alice = insert_user(&pool, "alice", UserRole::Instructor).await;
        let bob = insert_user(&pool, "bob", UserRole::Instructor).await;
        let course = service.create(&alice, form(subject, "rust")).await.unwrap();

        assert!(matches!(service.get_owned(&bob, course.id).await, Err(CourseServiceError::NotFound)));
        assert!(matches!(
            service.update(&bob, course.id, form(subject, "stolen")).await,
            Err(CourseServiceError::NotFound)
        ));
        assert!(matches!(service.delete(&bob, course.id).await, Err(CourseServiceError::NotFound)));
        assert!(service.list_owned(&bob).await.unwrap().is_empty());

        service.delete(&alice, course.id).await.unwrap();
        assert!(matches!(service.get_owned(&alice, course.id).await, Err(CourseServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_edit_form() {
        let (pool, service, subject) = setup().await;
        let alice = insert_user(&pool, "alice", UserRole::Instructor).await;
        let course = service.create(&alice, form(subject, "rust")).await.unwrap();

        let blank = service.edit_form(&alice, None).await.unwrap();
        assert!(blank.course.is_none());
        assert!(blank.form.slug.is_empty());

        let edit = service.edit_form(&alice, Some(course.id)).await.unwrap();
        assert_eq!(edit.form.slug, "rust");
        assert_eq!(edit.schema, CourseForm::schema());
    }
}

//! Public catalog
//!
//! Read-only views over subjects and courses for anonymous visitors, plus
//! subject administration.

use crate::db::repositories::{CourseRepository, EnrollmentRepository, ModuleRepository, SubjectRepository};
use crate::models::{CatalogListing, Course, CourseDetail, FormErrors, Subject, SubjectForm};
use crate::services::course::check_slug;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Not found")]
    NotFound,

    #[error("Invalid subject data")]
    Validation(FormErrors),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct CatalogService {
    subject_repo: Arc<dyn SubjectRepository>,
    course_repo: Arc<dyn CourseRepository>,
    module_repo: Arc<dyn ModuleRepository>,
    enrollment_repo: Arc<dyn EnrollmentRepository>,
}

impl CatalogService {
    pub fn new(
        subject_repo: Arc<dyn SubjectRepository>,
        course_repo: Arc<dyn CourseRepository>,
        module_repo: Arc<dyn ModuleRepository>,
        enrollment_repo: Arc<dyn EnrollmentRepository>,
    ) -> Self {
        Self {
            subject_repo,
            course_repo,
            module_repo,
            enrollment_repo,
        }
    }

    /// All subjects with course counts, and the courses of `subject_slug`
    /// (or all courses) with module counts.
    pub async fn listing(&self, subject_slug: Option<&str>) -> Result<CatalogListing, CatalogError> {
        let subject = match subject_slug {
            Some(slug) => Some(
                self.subject_repo
                    .get_by_slug(slug)
                    .await
                    .context("Failed to get subject")?
                    .ok_or(CatalogError::NotFound)?,
            ),
            None => None,
        };

        let subjects = self
            .subject_repo
            .list_with_counts()
            .await
            .context("Failed to list subjects")?;
        let courses = self
            .course_repo
            .list_with_counts(subject.as_ref().map(|s| s.id))
            .await
            .context("Failed to list courses")?;

        Ok(CatalogListing {
            subjects,
            subject,
            courses,
        })
    }

    pub async fn list_subjects(&self) -> Result<Vec<Subject>, CatalogError> {
        Ok(self.subject_repo.list().await.context("Failed to list subjects")?)
    }

    pub async fn get_subject(&self, id: i64) -> Result<Subject, CatalogError> {
        self.subject_repo
            .get_by_id(id)
            .await
            .context("Failed to get subject")?
            .ok_or(CatalogError::NotFound)
    }

    /// Every course with its modules and enrollment count, newest first
    pub async fn list_courses(&self) -> Result<Vec<CourseDetail>, CatalogError> {
        let courses = self.course_repo.list().await.context("Failed to list courses")?;
        let mut details = Vec::with_capacity(courses.len());
        for course in courses {
            details.push(self.detail(course).await?);
        }
        Ok(details)
    }

    pub async fn course_detail(&self, id: i64) -> Result<CourseDetail, CatalogError> {
        let course = self
            .course_repo
            .get_by_id(id)
            .await
            .context("Failed to get course")?
            .ok_or(CatalogError::NotFound)?;
        self.detail(course).await
    }

    pub async fn course_detail_by_slug(&self, slug: &str) -> Result<CourseDetail, CatalogError> {
        let course = self
            .course_repo
            .get_by_slug(slug)
            .await
            .context("Failed to get course")?
            .ok_or(CatalogError::NotFound)?;
        self.detail(course).await
    }

    pub async fn create_subject(&self, form: SubjectForm) -> Result<Subject, CatalogError> {
        let schema = SubjectForm::schema();
        let mut errors = FormErrors::new();
        schema.check(&mut errors, "title", &form.title);
        schema.check(&mut errors, "slug", &form.slug);
        check_slug(&mut errors, "slug", &form.slug);

        if errors.get("slug").is_none()
            && self
                .subject_repo
                .get_by_slug(&form.slug)
                .await
                .context("Failed to check subject slug")?
                .is_some()
        {
            errors.add("slug", "Subject with this slug already exists.");
        }
        errors.into_result().map_err(CatalogError::Validation)?;

        let subject = self
            .subject_repo
            .create(form.title.trim(), &form.slug)
            .await
            .context("Failed to create subject")?;
        tracing::info!(subject_id = subject.id, slug = %subject.slug, "Subject created");
        Ok(subject)
    }

    async fn detail(&self, course: Course) -> Result<CourseDetail, CatalogError> {
        let modules = self
            .module_repo
            .list_by_course(course.id)
            .await
            .context("Failed to list modules")?;
        let total_students = self
            .enrollment_repo
            .count_students(course.id)
            .await
            .context("Failed to count students")?;
        Ok(CourseDetail {
            course,
            modules,
            total_students,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_course, insert_subject, insert_user, setup_pool};
    use crate::db::repositories::{
        SqlxCourseRepository, SqlxEnrollmentRepository, SqlxModuleRepository, SqlxSubjectRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::UserRole;

    fn service(pool: &DynDatabasePool) -> CatalogService {
        CatalogService::new(
            SqlxSubjectRepository::boxed(pool.clone()),
            SqlxCourseRepository::boxed(pool.clone()),
            SqlxModuleRepository::boxed(pool.clone()),
            SqlxEnrollmentRepository::boxed(pool.clone()),
        )
    }

    #[tokio::test]
    async fn test_listing_counts_and_filter() {
        let pool = setup_pool().await;
        let catalog = service(&pool);
        let owner = insert_user(&pool, "instructor", UserRole::Instructor).await;
        let math = insert_subject(&pool, "math").await;
        let art = insert_subject(&pool, "art").await;
        let algebra = insert_course(&pool, owner.id, math.id, "algebra").await;
        insert_course(&pool, owner.id, art.id, "drawing").await;
        let modules = SqlxModuleRepository::new(pool.clone());
        modules.create(algebra.id, "Intro", "").await.unwrap();
        modules.create(algebra.id, "Groups", "").await.unwrap();

        let all = catalog.listing(None).await.unwrap();
        assert!(all.subject.is_none());
        assert_eq!(all.subjects.len(), 2);
        assert_eq!(all.courses.len(), 2);

        let filtered = catalog.listing(Some("math")).await.unwrap();
        assert_eq!(filtered.subject.as_ref().map(|s| s.id), Some(math.id));
        assert_eq!(filtered.courses.len(), 1);
        assert_eq!(filtered.courses[0].total_modules, 2);

        assert!(matches!(catalog.listing(Some("nope")).await, Err(CatalogError::NotFound)));
    }

    #[tokio::test]
    async fn test_course_detail_counts_students() {
        let pool = setup_pool().await;
        let catalog = service(&pool);
        let owner = insert_user(&pool, "instructor", UserRole::Instructor).await;
        let student = insert_user(&pool, "student", UserRole::Student).await;
        let math = insert_subject(&pool, "math").await;
        let course = insert_course(&pool, owner.id, math.id, "algebra").await;

        assert_eq!(catalog.course_detail(course.id).await.unwrap().total_students, 0);
        SqlxEnrollmentRepository::new(pool.clone())
            .add_student(course.id, student.id)
            .await
            .unwrap();
        let detail = catalog.course_detail_by_slug("algebra").await.unwrap();
        assert_eq!(detail.total_students, 1);

        assert!(matches!(catalog.course_detail(999).await, Err(CatalogError::NotFound)));
    }

    #[tokio::test]
    async fn test_create_subject_validation() {
        let pool = setup_pool().await;
        let catalog = service(&pool);

        let subject = catalog
            .create_subject(SubjectForm {
                title: "Physics".to_string(),
                slug: "physics".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(catalog.get_subject(subject.id).await.unwrap(), subject);

        let duplicate = catalog
            .create_subject(SubjectForm {
                title: "Physics again".to_string(),
                slug: "physics".to_string(),
            })
            .await;
        match duplicate {
            Err(CatalogError::Validation(errors)) => assert!(errors.get("slug").is_some()),
            other => panic!("expected validation error, got {:?}", other),
        }

        assert!(matches!(
            catalog.create_subject(SubjectForm::default()).await,
            Err(CatalogError::Validation(_))
        ));
    }
}

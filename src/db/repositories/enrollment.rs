//! Enrollment repository
//!
//! Rows of `course_students`. A student is enrolled at most once per course.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Enroll `user_id` in `course_id`. Enrolling twice is a no-op.
    async fn add_student(&self, course_id: i64, user_id: i64) -> Result<()>;
    async fn count_students(&self, course_id: i64) -> Result<i64>;
}

pub struct SqlxEnrollmentRepository {
    pool: DynDatabasePool,
}

impl SqlxEnrollmentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EnrollmentRepository> {
        Arc::new(Self::new(pool))
    }

    async fn count(&self, sql: &str, binds: &[i64], what: &'static str) -> Result<i64> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query_scalar::<sqlx::Sqlite, i64>(sql);
                for bind in binds {
                    query = query.bind(*bind);
                }
                query.fetch_one(self.pool.sqlite()?).await.context(what)?
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query_scalar::<sqlx::MySql, i64>(sql);
                for bind in binds {
                    query = query.bind(*bind);
                }
                query.fetch_one(self.pool.mysql()?).await.context(what)?
            }
        };
        Ok(count)
    }
}

#[async_trait]
impl EnrollmentRepository for SqlxEnrollmentRepository {
    async fn add_student(&self, course_id: i64, user_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("INSERT OR IGNORE INTO course_students (course_id, user_id) VALUES (?, ?)")
                    .bind(course_id)
                    .bind(user_id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to enroll student")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("INSERT IGNORE INTO course_students (course_id, user_id) VALUES (?, ?)")
                    .bind(course_id)
                    .bind(user_id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to enroll student")?;
            }
        }
        Ok(())
    }

    async fn count_students(&self, course_id: i64) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) FROM course_students WHERE course_id = ?",
            &[course_id],
            "Failed to count students",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_course, insert_subject, insert_user, setup_pool};
    use crate::models::UserRole;

    #[tokio::test]
    async fn test_enroll_is_idempotent() {
        let pool = setup_pool().await;
        let repo = SqlxEnrollmentRepository::new(pool.clone());
        let instructor = insert_user(&pool, "instructor", UserRole::Instructor).await;
        let student = insert_user(&pool, "student", UserRole::Student).await;
        let subject = insert_subject(&pool, "math").await;
        let course = insert_course(&pool, instructor.id, subject.id, "algebra").await;

        repo.add_student(course.id, student.id).await.unwrap();
        repo.add_student(course.id, student.id).await.unwrap();

        assert_eq!(repo.count_students(course.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_students_per_course() {
        let pool = setup_pool().await;
        let repo = SqlxEnrollmentRepository::new(pool.clone());
        let instructor = insert_user(&pool, "instructor", UserRole::Instructor).await;
        let subject = insert_subject(&pool, "math").await;
        let algebra = insert_course(&pool, instructor.id, subject.id, "algebra").await;
        let geometry = insert_course(&pool, instructor.id, subject.id, "geometry").await;

        for name in ["ann", "ben", "cid"] {
            let student = insert_user(&pool, name, UserRole::Student).await;
            repo.add_student(algebra.id, student.id).await.unwrap();
        }

        assert_eq!(repo.count_students(algebra.id).await.unwrap(), 3);
        assert_eq!(repo.count_students(geometry.id).await.unwrap(), 0);
    }
}

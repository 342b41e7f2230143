//! Course repository
//!
//! Owner-scoped lookups take the requesting user's id and match nothing when
//! the course belongs to someone else, so callers cannot tell a foreign
//! course from a missing one.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Course, CourseWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

use super::item::{delete_items_mysql, delete_items_sqlite};

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Insert a course; `id` and `created_at` of the input are ignored
    async fn create(&self, course: &Course) -> Result<Course>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Course>>;
    /// Course `id` if it is owned by `owner_id`
    async fn get_owned(&self, id: i64, owner_id: i64) -> Result<Option<Course>>;
    /// All courses, newest first
    async fn list(&self) -> Result<Vec<Course>>;
    /// Courses owned by `owner_id`, newest first
    async fn list_owned(&self, owner_id: i64) -> Result<Vec<Course>>;
    /// Courses with module counts, newest first, optionally for one subject
    async fn list_with_counts(&self, subject_id: Option<i64>) -> Result<Vec<CourseWithCount>>;
    /// Whether another course already uses `slug`
    async fn slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
    /// Update subject, title, slug and overview of an owned course
    async fn update_owned(&self, course: &Course) -> Result<bool>;
    /// Delete an owned course with its modules, contents, items and enrollments
    async fn delete_owned(&self, id: i64, owner_id: i64) -> Result<bool>;
    /// Courses `user_id` is enrolled in, newest first
    async fn list_enrolled(&self, user_id: i64) -> Result<Vec<Course>>;
    /// Course `id` if `user_id` is enrolled in it
    async fn get_enrolled(&self, id: i64, user_id: i64) -> Result<Option<Course>>;
}

macro_rules! course_from_row {
    ($row:expr) => {
        Course {
            id: $row.get("id"),
            owner_id: $row.get("owner_id"),
            subject_id: $row.get("subject_id"),
            title: $row.get("title"),
            slug: $row.get("slug"),
            overview: $row.get("overview"),
            created_at: $row.get("created_at"),
        }
    };
}

pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }

    /// Run a course query with the given i64 binds, returning every row.
    async fn fetch_courses(&self, sql: &str, binds: &[i64], what: &'static str) -> Result<Vec<Course>> {
        let courses = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query::<sqlx::Sqlite>(sql);
                for bind in binds {
                    query = query.bind(*bind);
                }
                query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context(what)?
                    .iter()
                    .map(|row| course_from_row!(row))
                    .collect()
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query::<sqlx::MySql>(sql);
                for bind in binds {
                    query = query.bind(*bind);
                }
                query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context(what)?
                    .iter()
                    .map(|row| course_from_row!(row))
                    .collect()
            }
        };
        Ok(courses)
    }

    async fn fetch_course(&self, sql: &str, binds: &[i64], what: &'static str) -> Result<Option<Course>> {
        Ok(self.fetch_courses(sql, binds, what).await?.into_iter().next())
    }
}

const COURSE_COLUMNS: &str = "c.id, c.owner_id, c.subject_id, c.title, c.slug, c.overview, c.created_at";
const NEWEST_FIRST: &str = "ORDER BY c.created_at DESC, c.id DESC";

// Contents below a course, resolved to the items they reference.
const COURSE_ITEM_REFS: &str = r#"
    SELECT ct.item_type, ct.item_id
    FROM contents ct
    JOIN modules m ON m.id = ct.module_id
    WHERE m.course_id = ?
"#;

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, course: &Course) -> Result<Course> {
        const SQL: &str = r#"
            INSERT INTO courses (owner_id, subject_id, title, slug, overview, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#;
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(course.owner_id)
                .bind(course.subject_id)
                .bind(&course.title)
                .bind(&course.slug)
                .bind(&course.overview)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create course")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(course.owner_id)
                .bind(course.subject_id)
                .bind(&course.title)
                .bind(&course.slug)
                .bind(&course.overview)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create course")?
                .last_insert_id() as i64,
        };
        Ok(Course {
            id,
            created_at: now,
            ..course.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        let sql = format!("SELECT {} FROM courses c WHERE c.id = ?", COURSE_COLUMNS);
        self.fetch_course(&sql, &[id], "Failed to get course").await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Course>> {
        let sql = format!("SELECT {} FROM courses c WHERE c.slug = ?", COURSE_COLUMNS);
        let course = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get course by slug")?
                .map(|row| course_from_row!(row)),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get course by slug")?
                .map(|row| course_from_row!(row)),
        };
        Ok(course)
    }

    async fn get_owned(&self, id: i64, owner_id: i64) -> Result<Option<Course>> {
        let sql = format!(
            "SELECT {} FROM courses c WHERE c.id = ? AND c.owner_id = ?",
            COURSE_COLUMNS
        );
        self.fetch_course(&sql, &[id, owner_id], "Failed to get owned course")
            .await
    }

    async fn list(&self) -> Result<Vec<Course>> {
        let sql = format!("SELECT {} FROM courses c {}", COURSE_COLUMNS, NEWEST_FIRST);
        self.fetch_courses(&sql, &[], "Failed to list courses").await
    }

    async fn list_owned(&self, owner_id: i64) -> Result<Vec<Course>> {
        let sql = format!(
            "SELECT {} FROM courses c WHERE c.owner_id = ? {}",
            COURSE_COLUMNS, NEWEST_FIRST
        );
        self.fetch_courses(&sql, &[owner_id], "Failed to list owned courses")
            .await
    }

    async fn list_with_counts(&self, subject_id: Option<i64>) -> Result<Vec<CourseWithCount>> {
        let filter = if subject_id.is_some() {
            "WHERE c.subject_id = ?"
        } else {
            ""
        };
        let sql = format!(
            r#"
            SELECT {cols},
                (SELECT COUNT(*) FROM modules m WHERE m.course_id = c.id) AS total_modules
            FROM courses c
            {filter}
            {order}
            "#,
            cols = COURSE_COLUMNS,
            filter = filter,
            order = NEWEST_FIRST
        );
        let courses = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query::<sqlx::Sqlite>(&sql);
                if let Some(subject_id) = subject_id {
                    query = query.bind(subject_id);
                }
                query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list courses with counts")?
                    .iter()
                    .map(|row| CourseWithCount {
                        course: course_from_row!(row),
                        total_modules: row.get("total_modules"),
                    })
                    .collect()
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query::<sqlx::MySql>(&sql);
                if let Some(subject_id) = subject_id {
                    query = query.bind(subject_id);
                }
                query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list courses with counts")?
                    .iter()
                    .map(|row| CourseWithCount {
                        course: course_from_row!(row),
                        total_modules: row.get("total_modules"),
                    })
                    .collect()
            }
        };
        Ok(courses)
    }

    async fn slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        const SQL: &str = "SELECT COUNT(*) FROM courses WHERE slug = ? AND id <> ?";
        // Ids start at 1, so 0 excludes nothing.
        let exclude = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(SQL)
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check course slug")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(SQL)
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check course slug")?,
        };
        Ok(count > 0)
    }

    async fn update_owned(&self, course: &Course) -> Result<bool> {
        const SQL: &str = r#"
            UPDATE courses SET subject_id = ?, title = ?, slug = ?, overview = ?
            WHERE id = ? AND owner_id = ?
        "#;
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(course.subject_id)
                .bind(&course.title)
                .bind(&course.slug)
                .bind(&course.overview)
                .bind(course.id)
                .bind(course.owner_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update course")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(course.subject_id)
                .bind(&course.title)
                .bind(&course.slug)
                .bind(&course.overview)
                .bind(course.id)
                .bind(course.owner_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update course")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete_owned(&self, id: i64, owner_id: i64) -> Result<bool> {
        const OWNED: &str = "SELECT COUNT(*) FROM courses WHERE id = ? AND owner_id = ?";
        const DELETE: &str = "DELETE FROM courses WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self.pool.sqlite()?.begin().await?;
                let owned: i64 = sqlx::query_scalar(OWNED)
                    .bind(id)
                    .bind(owner_id)
                    .fetch_one(&mut *tx)
                    .await
                    .context("Failed to check course owner")?;
                if owned == 0 {
                    return Ok(false);
                }
                let refs: Vec<(String, i64)> = sqlx::query_as(COURSE_ITEM_REFS)
                    .bind(id)
                    .fetch_all(&mut *tx)
                    .await
                    .context("Failed to collect course items")?;
                delete_items_sqlite(&mut tx, &refs).await?;
                // Modules, contents and enrollments go with the course.
                sqlx::query(DELETE)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete course")?;
                tx.commit().await?;
            }
            DatabaseDriver::Mysql => {
                let mut tx = self.pool.mysql()?.begin().await?;
                let owned: i64 = sqlx::query_scalar(OWNED)
                    .bind(id)
                    .bind(owner_id)
                    .fetch_one(&mut *tx)
                    .await
                    .context("Failed to check course owner")?;
                if owned == 0 {
                    return Ok(false);
                }
                let refs: Vec<(String, i64)> = sqlx::query_as(COURSE_ITEM_REFS)
                    .bind(id)
                    .fetch_all(&mut *tx)
                    .await
                    .context("Failed to collect course items")?;
                delete_items_mysql(&mut tx, &refs).await?;
                sqlx::query(DELETE)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete course")?;
                tx.commit().await?;
            }
        }
        Ok(true)
    }

    async fn list_enrolled(&self, user_id: i64) -> Result<Vec<Course>> {
        let sql = format!(
            "SELECT {} FROM courses c JOIN course_students cs ON cs.course_id = c.id WHERE cs.user_id = ? {}",
            COURSE_COLUMNS, NEWEST_FIRST
        );
        self.fetch_courses(&sql, &[user_id], "Failed to list enrolled courses")
            .await
    }

    async fn get_enrolled(&self, id: i64, user_id: i64) -> Result<Option<Course>> {
        let sql = format!(
            "SELECT {} FROM courses c JOIN course_students cs ON cs.course_id = c.id WHERE c.id = ? AND cs.user_id = ?",
            COURSE_COLUMNS
        );
        self.fetch_course(&sql, &[id, user_id], "Failed to get enrolled course")
            .await
    }
}
